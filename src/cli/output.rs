//! Output formatting for CLI commands.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cli::args::{GlaiveArgs, OutputFormat};
use crate::document::field_value::FieldValue;
use crate::search::result::SearchResult;

/// Results that know how to print themselves for humans.
pub trait HumanOutput {
    /// Render as plain text.
    fn render_human(&self) -> String;
}

/// Result of index creation.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateResult {
    pub path: String,
    pub generation: u64,
}

/// Result of document addition.
#[derive(Debug, Serialize, Deserialize)]
pub struct AddResult {
    pub documents_added: u64,
    pub documents_rejected: u64,
    pub duration_ms: u64,
    pub docs_per_second: f64,
    pub generation: Option<u64>,
}

/// One search hit.
#[derive(Debug, Serialize, Deserialize)]
pub struct HitOutput {
    pub segment: u32,
    pub doc: u32,
    pub score: f32,
    pub fields: Map<String, Value>,
}

impl From<&SearchResult> for HitOutput {
    fn from(result: &SearchResult) -> Self {
        let mut fields = Map::new();
        for (name, value) in &result.fields {
            let value = field_value_json(value);
            match fields.get_mut(name) {
                Some(Value::Array(values)) => values.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    fields.insert(name.clone(), value);
                }
            }
        }
        HitOutput {
            segment: result.address.segment_ord,
            doc: result.address.doc_id,
            score: result.score,
            fields,
        }
    }
}

/// Hits sharing a group key.
#[derive(Debug, Serialize, Deserialize)]
pub struct GroupOutput {
    pub key: Option<String>,
    pub hits: Vec<HitOutput>,
}

/// Result of a search.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchOutput {
    pub query: String,
    pub total_hits: u64,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub hits: Vec<HitOutput>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub groups: Option<Vec<GroupOutput>>,
}

/// Result of a delete.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResult {
    pub query: String,
    pub deleted: u64,
    pub generation: u64,
}

/// Result of index optimization.
#[derive(Debug, Serialize, Deserialize)]
pub struct OptimizeResult {
    pub segments_before: usize,
    pub segments_after: usize,
    pub duration_ms: u64,
    pub generation: u64,
}

/// Index statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexStats {
    pub path: String,
    pub generation: u64,
    pub documents: u64,
    pub deleted_documents: u64,
    pub segments: usize,
    pub size_bytes: u64,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub segment_stats: Option<Vec<SegmentStats>>,
}

/// Statistics of one segment.
#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentStats {
    pub name: String,
    pub max_doc: u32,
    pub deleted: u32,
    pub terms: usize,
    pub del_gen: u64,
}

/// Output a result in the selected format.
pub fn output_result<T: Serialize + HumanOutput>(
    message: &str,
    result: &T,
    args: &GlaiveArgs,
) -> anyhow::Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 0 && !message.is_empty() {
                println!("{message}");
                println!();
            }
            print!("{}", result.render_human());
        }
        OutputFormat::Json => {
            let json = if args.pretty {
                serde_json::to_string_pretty(result)?
            } else {
                serde_json::to_string(result)?
            };
            println!("{json}");
        }
    }
    Ok(())
}

/// JSON form of a stored value.
pub fn field_value_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(text) => Value::String(text.clone()),
        FieldValue::Integer(i) => Value::from(*i),
        FieldValue::Float(f) => Value::from(*f),
        FieldValue::Date(_) => Value::String(value.to_string()),
    }
}

fn render_hit(out: &mut String, rank: usize, hit: &HitOutput) {
    let _ = writeln!(
        out,
        "{rank:>3}. [{}:{}] score {:.4}",
        hit.segment, hit.doc, hit.score
    );
    for (name, value) in &hit.fields {
        let shown = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let _ = writeln!(out, "       {name}: {shown}");
    }
}

impl HumanOutput for CreateResult {
    fn render_human(&self) -> String {
        format!("Created index {} (generation {})\n", self.path, self.generation)
    }
}

impl HumanOutput for AddResult {
    fn render_human(&self) -> String {
        let mut out = format!(
            "Added {} documents in {} ms ({:.1} docs/s)\n",
            self.documents_added, self.duration_ms, self.docs_per_second
        );
        if self.documents_rejected > 0 {
            let _ = writeln!(out, "Rejected {} documents", self.documents_rejected);
        }
        match self.generation {
            Some(generation) => {
                let _ = writeln!(out, "Committed generation {generation}");
            }
            None => out.push_str("Not committed\n"),
        }
        out
    }
}

impl HumanOutput for SearchOutput {
    fn render_human(&self) -> String {
        let mut out = format!(
            "{} hits for {} ({} ms)\n",
            self.total_hits, self.query, self.duration_ms
        );
        let mut rank = 0;
        for hit in &self.hits {
            rank += 1;
            render_hit(&mut out, rank, hit);
        }
        for group in self.groups.iter().flatten() {
            let _ = writeln!(
                out,
                "\n== {} ({} hits)",
                group.key.as_deref().unwrap_or("(none)"),
                group.hits.len()
            );
            for hit in &group.hits {
                rank += 1;
                render_hit(&mut out, rank, hit);
            }
        }
        out
    }
}

impl HumanOutput for DeleteResult {
    fn render_human(&self) -> String {
        format!(
            "Deleted {} documents matching {} (generation {})\n",
            self.deleted, self.query, self.generation
        )
    }
}

impl HumanOutput for OptimizeResult {
    fn render_human(&self) -> String {
        format!(
            "Merged {} segments into {} in {} ms (generation {})\n",
            self.segments_before, self.segments_after, self.duration_ms, self.generation
        )
    }
}

impl HumanOutput for IndexStats {
    fn render_human(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Index:      {}", self.path);
        let _ = writeln!(out, "Generation: {}", self.generation);
        let _ = writeln!(out, "Documents:  {}", self.documents);
        let _ = writeln!(out, "Deleted:    {}", self.deleted_documents);
        let _ = writeln!(out, "Segments:   {}", self.segments);
        let _ = writeln!(out, "Size:       {} bytes", self.size_bytes);
        let _ = writeln!(out, "Locked:     {}", self.locked);
        for segment in self.segment_stats.iter().flatten() {
            let _ = writeln!(
                out,
                "  {}  docs {}  deleted {}  terms {}  del_gen {}",
                segment.name, segment.max_doc, segment.deleted, segment.terms, segment.del_gen
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::DocAddress;

    #[test]
    fn test_hit_output_collects_repeated_fields() {
        let result = SearchResult {
            address: DocAddress::new(0, 3),
            score: 1.5,
            fields: vec![
                ("tag".to_string(), FieldValue::from("a")),
                ("tag".to_string(), FieldValue::from("b")),
                ("rank".to_string(), FieldValue::from(7i64)),
            ],
        };
        let hit = HitOutput::from(&result);
        assert_eq!(hit.fields["tag"], serde_json::json!(["a", "b"]));
        assert_eq!(hit.fields["rank"], serde_json::json!(7));

        let rendered = SearchOutput {
            query: "tag:a".to_string(),
            total_hits: 1,
            duration_ms: 0,
            hits: vec![hit],
            groups: None,
        }
        .render_human();
        assert!(rendered.starts_with("1 hits for tag:a"));
        assert!(rendered.contains("rank: 7"));
    }
}
