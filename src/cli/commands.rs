//! Command implementations for the Glaive CLI.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, bail};
use log::{debug, info, warn};
use serde_json::Value;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::IndexConfig;
use crate::document::field_value::parse_date;
use crate::document::search_fields::SearchFields;
use crate::document::{Document, DocumentBuilder};
use crate::index::Index;
use crate::query::parser::{Operator, QueryParser};
use crate::query::searcher::SearchRequest;
use crate::query::sort::SortDescriptor;
use crate::search::result::SearchResult;
use crate::search::results::SearchResults;

/// Name of the configuration file kept inside an index directory.
pub const CONFIG_FILE_NAME: &str = "glaive.json";

/// Execute a CLI command.
pub fn execute_command(args: GlaiveArgs) -> anyhow::Result<()> {
    match &args.command {
        Command::Create(create_args) => create_index(create_args, &args),
        Command::Add(add_args) => add_documents(add_args, &args),
        Command::Search(search_args) => search_index(search_args, &args),
        Command::Delete(delete_args) => delete_documents(delete_args, &args),
        Command::Optimize(optimize_args) => optimize_index(optimize_args, &args),
        Command::Stats(stats_args) => show_stats(stats_args, &args),
    }
}

/// Configuration from `--config`, the index directory or the defaults.
fn load_config(index_path: &Path, cli_args: &GlaiveArgs) -> anyhow::Result<IndexConfig> {
    let stored = index_path.join(CONFIG_FILE_NAME);
    let path = match &cli_args.config {
        Some(path) => path.clone(),
        None if stored.exists() => stored,
        None => return Ok(IndexConfig::default()),
    };
    debug!("Loading configuration from {}", path.display());
    IndexConfig::from_file(&path)
        .with_context(|| format!("Failed to load configuration {}", path.display()))
}

fn open_existing(index_path: &Path, cli_args: &GlaiveArgs) -> anyhow::Result<Index> {
    if !index_path.is_dir() {
        bail!("No index at {}", index_path.display());
    }
    let config = load_config(index_path, cli_args)?;
    Index::open(index_path, config)
        .with_context(|| format!("Failed to open index {}", index_path.display()))
}

/// Create a new index.
fn create_index(args: &CreateArgs, cli_args: &GlaiveArgs) -> anyhow::Result<()> {
    if args.index_path.exists() {
        if !args.force {
            bail!(
                "{} already exists. Use --force to overwrite.",
                args.index_path.display()
            );
        }
        warn!("Removing existing index at {}", args.index_path.display());
        fs::remove_dir_all(&args.index_path)
            .with_context(|| format!("Failed to remove {}", args.index_path.display()))?;
    }

    let config = load_config(&args.index_path, cli_args)?;
    config.validate()?;
    fs::create_dir_all(&args.index_path)?;
    fs::write(
        args.index_path.join(CONFIG_FILE_NAME),
        serde_json::to_string_pretty(&config)?,
    )?;

    let index = Index::open(&args.index_path, config)?;
    let mut writer = index.writer()?;
    let committed = writer.commit()?;
    info!("Created index at {}", args.index_path.display());

    output_result(
        "Index created successfully",
        &CreateResult {
            path: args.index_path.display().to_string(),
            generation: committed.generation,
        },
        cli_args,
    )
}

/// Add documents from a JSON Lines file.
fn add_documents(args: &AddArgs, cli_args: &GlaiveArgs) -> anyhow::Result<()> {
    let index = open_existing(&args.index_path, cli_args)?;
    let file = File::open(&args.document_file)
        .with_context(|| format!("Failed to open {}", args.document_file.display()))?;
    let reader = BufReader::new(file);

    let start_time = Instant::now();
    let mut writer = index.writer()?;
    let mut added = 0u64;
    let mut rejected = 0u64;
    let mut generation = None;

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let document = match serde_json::from_str::<Value>(&line)
            .map_err(anyhow::Error::from)
            .and_then(|value| json_to_document(&value))
        {
            Ok(document) => document,
            Err(e) => {
                warn!("Skipping line {}: {e}", line_num + 1);
                rejected += 1;
                continue;
            }
        };

        let key = args
            .update_on
            .as_deref()
            .and_then(|field| Some((field, document.get_value(field)?.to_string())));
        match key {
            Some((field, text)) => writer.update_document(field, &text, document)?,
            None => writer.add_document(document)?,
        }
        added += 1;

        if !args.no_commit && args.batch_size > 0 && added % args.batch_size as u64 == 0 {
            generation = Some(writer.commit()?.generation);
            if cli_args.verbosity() > 1 {
                println!("Committed {added} documents...");
            }
        }
    }
    if !args.no_commit {
        generation = Some(writer.commit()?.generation);
    }

    let duration = start_time.elapsed();
    output_result(
        "Documents added",
        &AddResult {
            documents_added: added,
            documents_rejected: rejected,
            duration_ms: duration.as_millis() as u64,
            docs_per_second: if duration.as_secs_f64() > 0.0 {
                added as f64 / duration.as_secs_f64()
            } else {
                0.0
            },
            generation,
        },
        cli_args,
    )
}

/// Convert a JSON object to a document.
///
/// Identifier and type fields are indexed verbatim, strings in the
/// timestamp field as dates when they parse, other strings as analyzed
/// text. Numbers keep their integer or float type. Arrays add one value
/// per element.
pub fn json_to_document(value: &Value) -> anyhow::Result<Document> {
    let Value::Object(object) = value else {
        bail!("expected a JSON object, got {value}");
    };
    let mut builder = Document::builder();
    for (name, value) in object {
        builder = add_json_value(builder, name, value)?;
    }
    Ok(builder.build())
}

fn add_json_value(builder: DocumentBuilder, name: &str, value: &Value) -> anyhow::Result<DocumentBuilder> {
    Ok(match value {
        Value::Null => builder,
        Value::Bool(b) => builder.add_keyword(name, b.to_string()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => builder.add_integer(name, i),
            None => match n.as_f64() {
                Some(f) => builder.add_float(name, f),
                None => bail!("field {name}: number {n} out of range"),
            },
        },
        Value::String(s) if name == SearchFields::IDENTIFIER || name == SearchFields::OBJECT_TYPE => {
            builder.add_keyword(name, s.as_str())
        }
        Value::String(s) if name == SearchFields::TIMESTAMP => match parse_date(s) {
            Some(date) => builder.add_date(name, date),
            None => builder.add_text(name, s.as_str()),
        },
        Value::String(s) => builder.add_text(name, s.as_str()),
        Value::Array(values) => {
            let mut builder = builder;
            for value in values {
                builder = add_json_value(builder, name, value)?;
            }
            builder
        }
        Value::Object(_) => bail!("field {name}: nested objects are not supported"),
    })
}

/// Search the index.
fn search_index(args: &SearchArgs, cli_args: &GlaiveArgs) -> anyhow::Result<()> {
    let index = open_existing(&args.index_path, cli_args)?;
    let mut parser = index.query_parser();
    if !args.fields.is_empty() {
        parser = QueryParser::new(index.analyzer().clone(), args.fields.iter())
            .with_default_operator(parser.default_operator());
    }
    if let Some(operator) = args.operator {
        parser = parser.with_default_operator(match operator {
            OperatorArg::And => Operator::And,
            OperatorArg::Or => Operator::Or,
        });
    }
    let query = parser
        .parse(&args.query)
        .with_context(|| format!("Invalid query {:?}", args.query))?;
    debug!("Parsed {:?} as {query}", args.query);

    let mut request = SearchRequest::new(query.clone())
        .offset(args.offset)
        .limit(args.limit);
    for sort in &args.sort {
        request = request.sort_by(SortDescriptor::parse(sort)?);
    }

    let start_time = Instant::now();
    let results = index.searcher().execute(&request)?;
    let total_hits = results.total_hits();
    let (hits, groups) = if let Some(field) = &args.group_by {
        let groups = results
            .grouped_by_field(field)?
            .into_iter()
            .map(|group| GroupOutput {
                key: group.key.map(|key| key.to_string()),
                hits: group.results.iter().map(|r| project(r, &args.show)).collect(),
            })
            .collect();
        (Vec::new(), Some(groups))
    } else if let Some(field) = &args.group_by_day {
        let groups = results
            .grouped_by_day(field)?
            .into_iter()
            .map(|group| GroupOutput {
                key: group.day.map(|day| day.to_string()),
                hits: group.results.iter().map(|r| project(r, &args.show)).collect(),
            })
            .collect();
        (Vec::new(), Some(groups))
    } else {
        (collect_hits(results, &args.show)?, None)
    };

    output_result(
        "",
        &SearchOutput {
            query: query.to_string(),
            total_hits,
            duration_ms: start_time.elapsed().as_millis() as u64,
            hits,
            groups,
        },
        cli_args,
    )
}

fn collect_hits(results: SearchResults, show: &[String]) -> anyhow::Result<Vec<HitOutput>> {
    let mut hits = Vec::with_capacity(results.len());
    for result in results {
        hits.push(project(&result?, show));
    }
    Ok(hits)
}

fn project(result: &SearchResult, show: &[String]) -> HitOutput {
    let mut hit = HitOutput::from(result);
    if !show.is_empty() {
        hit.fields.retain(|name, _| show.contains(name));
    }
    hit
}

/// Delete the documents matching a query.
fn delete_documents(args: &DeleteArgs, cli_args: &GlaiveArgs) -> anyhow::Result<()> {
    let index = open_existing(&args.index_path, cli_args)?;
    let query = index
        .query_parser()
        .parse(&args.query)
        .with_context(|| format!("Invalid query {:?}", args.query))?;
    let mut writer = index.writer()?;
    let deleted = writer.delete_documents(&query)?;
    let committed = writer.commit()?;

    output_result(
        "",
        &DeleteResult {
            query: query.to_string(),
            deleted,
            generation: committed.generation,
        },
        cli_args,
    )
}

/// Merge segments.
fn optimize_index(args: &OptimizeArgs, cli_args: &GlaiveArgs) -> anyhow::Result<()> {
    let index = open_existing(&args.index_path, cli_args)?;
    let segments_before = index.snapshot().segments().len();
    let start_time = Instant::now();

    let mut writer = index.writer()?;
    let committed = writer.force_merge(args.max_segments)?;
    let segments_after = index.snapshot().segments().len();

    output_result(
        "Index optimized",
        &OptimizeResult {
            segments_before,
            segments_after,
            duration_ms: start_time.elapsed().as_millis() as u64,
            generation: committed.generation,
        },
        cli_args,
    )
}

/// Show index statistics.
fn show_stats(args: &StatsArgs, cli_args: &GlaiveArgs) -> anyhow::Result<()> {
    let index = open_existing(&args.index_path, cli_args)?;
    let snapshot = index.snapshot();
    let storage = index.storage();

    let size_bytes = snapshot
        .manifest()
        .referenced_files()
        .iter()
        .filter_map(|file| storage.file_size(file).ok())
        .sum();
    let segment_stats = args.detailed.then(|| {
        snapshot
            .segments()
            .iter()
            .map(|segment| SegmentStats {
                name: segment.name().to_string(),
                max_doc: segment.max_doc(),
                deleted: segment.deleted_count(),
                terms: segment.term_count(),
                del_gen: segment.del_gen(),
            })
            .collect()
    });

    output_result(
        "",
        &IndexStats {
            path: args.index_path.display().to_string(),
            generation: snapshot.generation(),
            documents: snapshot.num_docs(),
            deleted_documents: snapshot.max_doc() - snapshot.num_docs(),
            segments: snapshot.segments().len(),
            size_bytes,
            locked: index.is_locked()?,
            segment_stats,
        },
        cli_args,
    )
}
