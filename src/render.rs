//! Diagram rendering: Graphviz DOT text, and images through the `dot` binary.

use crate::error::{FishboneError, Result};
use crate::fishbone::{FishboneGraph, NodeKind};
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Svg,
    Png,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Svg => "svg",
            ImageFormat::Png => "png",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Svg => "image/svg+xml",
            ImageFormat::Png => "image/png",
        }
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = FishboneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "svg" => Ok(ImageFormat::Svg),
            "png" => Ok(ImageFormat::Png),
            other => Err(FishboneError::Render(format!("unsupported image format: {}", other))),
        }
    }
}

fn node_style(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Issue => r#"shape="box", style="filled", color="lightblue""#,
        NodeKind::Category => r#"shape="ellipse", color="gray""#,
        NodeKind::Cause => r#"shape="note", color="lightgray""#,
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// DOT source for the graph. Edges run right to left so the issue sits at the head.
pub fn to_dot(graph: &FishboneGraph) -> String {
    let mut dot = String::from("digraph fishbone {\n    rankdir=RL;\n");
    for node in &graph.nodes {
        dot.push_str(&format!(
            "    \"{}\" [label=\"{}\", {}];\n",
            escape(&node.id),
            escape(&node.label),
            node_style(node.kind)
        ));
    }
    for edge in &graph.edges {
        dot.push_str(&format!(
            "    \"{}\" -> \"{}\";\n",
            escape(&edge.from),
            escape(&edge.to)
        ));
    }
    dot.push_str("}\n");
    dot
}

/// Pipe DOT source through Graphviz and return the image bytes.
pub fn render_image(dot_source: &str, format: ImageFormat) -> Result<Vec<u8>> {
    debug!(format = format.as_str(), "Rendering diagram with graphviz");
    let mut command = Command::new("dot");
    command.arg(format!("-T{}", format.as_str()));
    pipe_through(command, dot_source.as_bytes())
}

/// Feed `input` to the child's stdin and collect stdout. The child is always
/// waited on, so a failed write still reports the child's stderr.
fn pipe_through(mut command: Command, input: &[u8]) -> Result<Vec<u8>> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| FishboneError::Render(format!("failed to start graphviz `dot`: {}", e)))?;

    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(input),
        None => Err(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "graphviz stdin unavailable",
        )),
    };

    let output = child.wait_with_output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("graphviz exited with {}: {}", output.status, stderr.trim());
        return Err(FishboneError::Render(format!("graphviz failed: {}", stderr.trim())));
    }
    if let Err(e) = written {
        return Err(FishboneError::Render(format!("failed to send diagram to graphviz: {}", e)));
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CategoryCauses;

    #[test]
    fn test_dot_styles_and_edges() {
        let graph = FishboneGraph::build(
            "Missing \"Customer\" IDs",
            &[CategoryCauses {
                category: "People".to_string(),
                causes: vec!["Untrained staff".to_string()],
            }],
        );
        let dot = to_dot(&graph);

        assert!(dot.starts_with("digraph fishbone {"));
        assert!(dot.contains(r#""main" [label="Missing \"Customer\" IDs", shape="box", style="filled", color="lightblue"];"#));
        assert!(dot.contains(r#""cat_People" [label="People", shape="ellipse", color="gray"];"#));
        assert!(dot.contains(r#""People_Untrained staff" [label="Untrained staff", shape="note", color="lightgray"];"#));
        assert!(dot.contains(r#""People_Untrained staff" -> "cat_People";"#));
        assert!(dot.contains(r#""cat_People" -> "main";"#));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[cfg(unix)]
    #[test]
    fn test_renderer_exiting_early_reports_stderr() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo 'syntax error in line 1' >&2; exit 3"]);
        let input = vec![b'x'; 1 << 20];

        match pipe_through(command, &input) {
            Err(FishboneError::Render(msg)) => assert!(msg.contains("syntax error in line 1"), "{}", msg),
            other => panic!("expected render error, got {:?}", other.map(|b| b.len())),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_renderer_output_is_collected() {
        let command = Command::new("cat");
        assert_eq!(pipe_through(command, b"digraph {}").unwrap(), b"digraph {}");
    }

    #[test]
    fn test_image_format_parse() {
        assert_eq!("SVG".parse::<ImageFormat>().unwrap(), ImageFormat::Svg);
        assert_eq!("png".parse::<ImageFormat>().unwrap().mime(), "image/png");
        assert!("gif".parse::<ImageFormat>().is_err());
    }
}
