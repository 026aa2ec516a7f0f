use std::{fs, path::PathBuf};

use tempfile::tempdir;

use cartograph_cli::{Args, run};

/// Collects all .world files from a directory
fn collect_world_files(dir: PathBuf) -> Vec<PathBuf> {
    let mut files = if let Ok(entries) = fs::read_dir(&dir) {
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("world")
            })
            .collect()
    } else {
        Vec::new()
    };

    files.sort();
    files
}

/// Demos are at workspace root, relative to workspace not the crate
fn demos_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("demos")
}

fn args_for(input: &PathBuf, config: Option<String>) -> Args {
    Args {
        input: input.to_string_lossy().to_string(),
        config,
        log_level: "off".to_string(),
        bom: false,
    }
}

#[test]
fn e2e_smoke_test_valid_demos() {
    let valid_demos = collect_world_files(demos_path());
    assert!(!valid_demos.is_empty(), "No valid demos found in demos/");

    let mut failed_demos = Vec::new();
    for demo_path in &valid_demos {
        if let Err(e) = run(&args_for(demo_path, None)) {
            failed_demos.push((demo_path.clone(), e));
        }
    }

    if !failed_demos.is_empty() {
        eprintln!("\nValid demos that failed:");
        for (path, err) in &failed_demos {
            eprintln!("  - {}: {}", path.display(), err);
        }
        panic!("{} valid demo(s) failed unexpectedly", failed_demos.len());
    }
}

#[test]
fn e2e_smoke_test_error_demos() {
    let error_demos = collect_world_files(demos_path().join("errors"));
    assert!(
        !error_demos.is_empty(),
        "No error demos found in demos/errors/"
    );

    let unexpectedly_succeeded: Vec<_> = error_demos
        .iter()
        .filter(|path| run(&args_for(path, None)).is_ok())
        .collect();

    if !unexpectedly_succeeded.is_empty() {
        eprintln!("\nError demos that unexpectedly succeeded:");
        for path in &unexpectedly_succeeded {
            eprintln!("  - {}", path.display());
        }
        panic!(
            "{} error demo(s) succeeded unexpectedly",
            unexpectedly_succeeded.len()
        );
    }
}

#[test]
fn e2e_explicit_config_is_used() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[report]\nbill_of_materials = true\n").unwrap();

    let demo = demos_path().join("manor.world");
    let bom = run(&args_for(&demo, Some(config_path.to_string_lossy().to_string()))).unwrap();

    assert_eq!(bom.plots, 3);
    assert_eq!(bom.fixtures, 2);
    assert_eq!(bom.items, 5);
    assert_eq!(bom.actors, 2);
    assert_eq!(bom.contents["hall"].len(), 4);
}

#[test]
fn e2e_missing_input_is_an_error() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let missing = temp_dir.path().join("absent.world");

    assert!(run(&args_for(&missing, None)).is_err());
}
