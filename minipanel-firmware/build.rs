//! Build script for minipanel-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates the embedded panel.toml catalog at compile time

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    setup_linker();
    validate_catalog();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate panel.toml, the catalog baked into the image
fn validate_catalog() {
    println!("cargo:rerun-if-changed=panel.toml");

    let path = Path::new("panel.toml");

    if !path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: panel.toml not found!                                    ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds panel.toml as its default catalog.          ║\n\
            ║  Please create one in the minipanel-firmware directory.          ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read panel.toml                                ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let catalog: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in panel.toml                        ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&e.to_string())
            );
        }
    };

    validate_required_sections(&catalog);
    validate_profiles(&catalog);
    validate_pages(&catalog);
    validate_nodes(&catalog);

    println!("cargo:warning=panel.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn report(title: &str, errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

fn section_keys(catalog: &toml::Value, section: &str) -> Vec<String> {
    catalog
        .get(section)
        .and_then(|s| s.as_table())
        .map(|t| t.keys().cloned().collect())
        .unwrap_or_default()
}

/// Validate that required sections exist
fn validate_required_sections(catalog: &toml::Value) {
    let mut errors = Vec::new();

    for section in ["profile", "page", "node"] {
        if catalog.get(section).is_none() {
            errors.push(format!("Missing [{}.*] section", section));
        }
    }

    report("Missing required sections in panel.toml", &errors);
}

/// Validate profile backends and page lists
fn validate_profiles(catalog: &toml::Value) {
    let profiles = match catalog.get("profile") {
        Some(toml::Value::Table(t)) => t,
        _ => return,
    };
    let pages = section_keys(catalog, "page");
    let nodes = section_keys(catalog, "node");

    let mut errors = Vec::new();

    for (name, profile) in profiles {
        let profile = match profile {
            toml::Value::Table(t) => t,
            _ => {
                errors.push(format!("[profile.{}] must be a table", name));
                continue;
            }
        };

        match profile.get("backend") {
            Some(toml::Value::String(backend)) => {
                if !["serial", "registration"].contains(&backend.as_str()) {
                    errors.push(format!(
                        "[profile.{}] backend must be 'serial' or 'registration'",
                        name
                    ));
                }
            }
            _ => errors.push(format!("[profile.{}] missing 'backend'", name)),
        }

        match profile.get("pages") {
            Some(toml::Value::Array(list)) => {
                if list.is_empty() {
                    errors.push(format!("[profile.{}] pages cannot be empty", name));
                }
                for page in list {
                    match page.as_str() {
                        Some(p) if pages.iter().any(|k| k == p) => {}
                        Some(p) => errors.push(format!(
                            "[profile.{}] references unknown page '{}'",
                            name, p
                        )),
                        None => errors.push(format!("[profile.{}] pages must be strings", name)),
                    }
                }
            }
            _ => errors.push(format!("[profile.{}] missing 'pages'", name)),
        }

        if let Some(clock) = profile.get("clock") {
            match clock.as_str() {
                Some(c) if nodes.iter().any(|k| k == c) => {}
                _ => errors.push(format!("[profile.{}] clock must name a node", name)),
            }
        }
    }

    report("Invalid profile configuration", &errors);
}

/// Validate page clones and node references
fn validate_pages(catalog: &toml::Value) {
    let pages = match catalog.get("page") {
        Some(toml::Value::Table(t)) => t,
        _ => return,
    };
    let nodes = section_keys(catalog, "node");

    let mut errors = Vec::new();

    for (name, page) in pages {
        let page = match page {
            toml::Value::Table(t) => t,
            _ => {
                errors.push(format!("[page.{}] must be a table", name));
                continue;
            }
        };

        if let Some(toml::Value::String(source)) = page.get("clone") {
            if !pages.contains_key(source) {
                errors.push(format!("[page.{}] clones unknown page '{}'", name, source));
            }
            continue;
        }

        if page.get("surface").is_none() {
            errors.push(format!("[page.{}] missing 'surface'", name));
        }

        if let Some(toml::Value::Array(list)) = page.get("nodes") {
            for node in list {
                if let Some(n) = node.as_str() {
                    if !nodes.iter().any(|k| k == n) {
                        errors.push(format!("[page.{}] references unknown node '{}'", name, n));
                    }
                }
            }
        }
    }

    report("Invalid page configuration", &errors);
}

/// Validate key array references
fn validate_nodes(catalog: &toml::Value) {
    let nodes = match catalog.get("node") {
        Some(toml::Value::Table(t)) => t,
        _ => return,
    };
    let groups = catalog.get("keys").and_then(|k| k.as_table());

    let mut errors = Vec::new();

    for (name, node) in nodes {
        let Some(keys) = node.get("keys") else {
            continue;
        };
        let group = keys
            .as_str()
            .and_then(|k| groups.and_then(|g| g.get(k)))
            .and_then(|g| g.get("commands"))
            .and_then(|c| c.as_array());
        let Some(commands) = group else {
            errors.push(format!("[node.{}] keys must name a [keys] group", name));
            continue;
        };
        let units = node
            .get("key_units")
            .and_then(|u| u.as_integer())
            .unwrap_or(1)
            .max(1) as usize;
        if commands.len() < units {
            errors.push(format!("[node.{}] key group too short for {} units", name, units));
        }
    }

    report("Invalid node configuration", &errors);
}
