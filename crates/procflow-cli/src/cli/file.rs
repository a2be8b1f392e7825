//! Graph definition files.
//!
//! `.yaml`/`.yml` files are parsed as YAML; everything else as JSON.

use std::path::Path;

use anyhow::{Context, Result};
use procflow_types::graph::GraphDefinition;

pub fn parse_graph(content: &str, path: &Path) -> Result<GraphDefinition> {
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    let mut def: GraphDefinition = if is_yaml {
        serde_yaml_ng::from_str(content)
            .with_context(|| format!("invalid YAML graph in {}", path.display()))?
    } else {
        serde_json::from_str(content)
            .with_context(|| format!("invalid JSON graph in {}", path.display()))?
    };
    def.build_node_index();
    Ok(def)
}

pub async fn load_graph_file(path: &Path) -> Result<GraphDefinition> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_graph(&content, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
name: greet
rootNodeIds: [hello]
nodes:
  - id: hello
    name: Hello
    type: logging
    properties:
      message: hi there
    childNodeIds: [sum]
  - id: sum
    name: Sum
    type: math.addition
    properties:
      leftOperand: "1"
      rightOperand: "2"
"#;

    #[test]
    fn parses_yaml_by_extension() {
        let def = parse_graph(YAML, Path::new("greet.yml")).unwrap();
        assert_eq!(def.name, "greet");
        assert_eq!(def.root_node_ids, vec!["hello"]);
        let hello = def.node_by_id("hello").unwrap();
        assert_eq!(hello.node_type, "logging");
        assert_eq!(hello.property("message"), Some("hi there"));
        assert_eq!(hello.child_node_ids, vec!["sum"]);
    }

    #[test]
    fn parses_json_otherwise() {
        let json = r#"{"name":"one","rootNodeIds":["a"],"nodes":[{"id":"a","name":"A","type":"logging"}]}"#;
        let def = parse_graph(json, Path::new("one.json")).unwrap();
        assert_eq!(def.nodes.len(), 1);
        assert!(def.node_by_id("a").is_some());
    }

    #[test]
    fn reports_the_file_on_parse_error() {
        let err = parse_graph("{", Path::new("broken.json")).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[tokio::test]
    async fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greet.yaml");
        tokio::fs::write(&path, YAML).await.unwrap();
        let def = load_graph_file(&path).await.unwrap();
        assert_eq!(def.nodes.len(), 2);
    }
}
