//! Plugin discovery through the public API.
#![cfg(unix)]

use diagrun::check::{MetadataDocument, ModuleRegistry, SimpleModule, Summary};
use diagrun::error::LoadErrorKind;
use diagrun::loader::{Loader, HOST_API_VERSION};
use diagrun::DiagError;
use serde_json::{json, Map};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn executable_check(dir: &Path, file: &str, api: &str, name: &str) -> PathBuf {
    let path = dir.join(file);
    let body = format!(
        "#!/bin/sh\ncase \"$1\" in\n  --get_api_version) echo '{}' ;;\n  --get_metadata) echo '{{\"name\": \"{}\", \"tags\": \"default\", \"timeout\": 5}}' ;;\n  --get_summary) echo '{{\"result\": {{\"{}\": {{\"status\": \"PASS\", \"result\": 1}}}}}}' ;;\nesac\n",
        api, name, name
    );
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn gpu_module() -> SimpleModule {
    let doc = MetadataDocument::from_json(
        r#"{"name": "gpu_check", "type": "Data", "tags": "gpu,default", "timeout": 10, "run": "run_gpu"}"#,
    )
    .unwrap();
    SimpleModule::new(HOST_API_VERSION).with_check(doc, |_| {
        let mut entries = Map::new();
        entries.insert("GPU".into(), json!({"status": "PASS", "result": "ok"}));
        Summary::from_entries(entries)
    })
}

fn loader_with_gpu_module() -> Loader {
    let mut registry = ModuleRegistry::new();
    registry.register("gpu", gpu_module());
    Loader::new(registry)
}

#[test]
fn old_api_plugin_contributes_nothing() {
    let temp = TempDir::new().unwrap();
    executable_check(temp.path(), "a.sh", "0.1", "old_check");
    executable_check(temp.path(), "b.sh", "0.2", "new_check");

    let discovery = Loader::new(ModuleRegistry::new()).discover_locations(&[temp.path().to_path_buf()]);

    let names: Vec<_> = discovery.checks().iter().map(|c| c.name()).collect();
    assert_eq!(names, ["new_check"]);
    assert_eq!(discovery.failures().len(), 1);
    assert!(matches!(
        &discovery.failures()[0],
        DiagError::Load {
            kind: LoadErrorKind::ApiVersionMismatch { .. },
            ..
        }
    ));
}

#[test]
fn duplicate_gpu_check_fails_before_running() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("gpu.module"), "").unwrap();
    executable_check(temp.path(), "gpu_check.sh", "0.2", "gpu_check");

    let discovery = loader_with_gpu_module().discover_locations(&[temp.path().to_path_buf()]);
    assert_eq!(discovery.len(), 2);

    let err = discovery.into_checks().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, DiagError::DuplicateCheck { ref name, .. } if name == "gpu_check"));
}

#[test]
fn config_entry_yielding_nothing_aborts_load() {
    let temp = TempDir::new().unwrap();
    executable_check(temp.path(), "exe.sh", "0.2", "exe_check");
    let config = temp.path().join("config.json");
    fs::write(
        &config,
        r#"[{"path": "exe.sh"}, {"path": "missing.sh"}]"#,
    )
    .unwrap();

    let err = Loader::new(ModuleRegistry::new())
        .load_config(&config)
        .unwrap_err();
    assert!(matches!(err, DiagError::Configuration { .. }));
    assert!(err.to_string().contains("missing.sh"));
}

#[test]
fn config_entry_name_narrows_module_checks() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("gpu.module"), "").unwrap();
    let config = temp.path().join("config.json");
    fs::write(&config, r#"[{"path": "gpu.module", "name": "gpu_check"}]"#).unwrap();

    let discovery = loader_with_gpu_module().load_config(&config).unwrap();
    let checks = discovery.into_checks().unwrap();
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].name(), "gpu_check");
}

#[test]
fn search_path_mixes_files_and_directories() {
    let dir = TempDir::new().unwrap();
    let other = TempDir::new().unwrap();
    executable_check(dir.path(), "a.sh", "0.2", "a_check");
    let single = executable_check(other.path(), "b.sh", "0.2", "b_check");

    let value = std::env::join_paths([dir.path().to_path_buf(), single]).unwrap();
    let locations = diagrun::loader::search_locations(&value);
    let discovery = Loader::new(ModuleRegistry::new()).discover_locations(&locations);

    let names: Vec<_> = discovery.checks().iter().map(|c| c.name()).collect();
    assert_eq!(names, ["a_check", "b_check"]);
}

#[test]
fn unregistered_module_file_is_a_load_failure() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("unknown.module");
    fs::write(&path, "").unwrap();

    let discovery = Loader::new(ModuleRegistry::new()).discover(&[path]);
    assert!(discovery.is_empty());
    assert_eq!(discovery.failures().len(), 1);
}
