use std::fs;
use std::path::Path;

use venture_finance_core::Assumptions;

/// Load analysis defaults from a YAML file, or the built-in defaults when no
/// file is given. A named file that cannot be read is an error.
pub fn load_assumptions(path: Option<&str>) -> Result<Assumptions, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(Assumptions::default());
    };
    let p = Path::new(path);
    if !p.is_file() {
        return Err(format!("Assumptions file not found: {}", p.display()).into());
    }
    let contents = fs::read_to_string(p)
        .map_err(|e| format!("Failed to read '{}': {}", p.display(), e))?;
    let assumptions = parse_assumptions(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", p.display(), e))?;
    tracing::debug!(path = %p.display(), ?assumptions, "loaded assumptions");
    Ok(assumptions)
}

fn parse_assumptions(contents: &str) -> Result<Assumptions, serde_yaml::Error> {
    if contents.trim().is_empty() {
        return Ok(Assumptions::default());
    }
    serde_yaml::from_str(contents)
}
