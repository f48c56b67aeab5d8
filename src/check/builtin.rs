//! Modules shipped with the binary.

use serde_json::{json, Map, Value};

use super::{MetadataDocument, ModuleRegistry, SimpleModule, Summary};
use crate::error::Result;
use crate::shell;

/// Name of the built-in host module.
pub const HOST_MODULE: &str = "host";

/// Registry holding every built-in module for `api_version`.
pub fn registry(api_version: &str) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register(HOST_MODULE, host_module(api_version));
    registry
}

/// Reports basic facts about the machine the runner is on.
pub fn host_module(api_version: &str) -> SimpleModule {
    let doc = MetadataDocument {
        name: "host_check".to_string(),
        kind: "Data".to_string(),
        tags: "default,host".to_string(),
        descr: "Reports the operating system, architecture and privilege level of the host."
            .to_string(),
        data_req: "{}".to_string(),
        rights: "user".to_string(),
        timeout: 5,
        version: "1".to_string(),
        run: "run_host_check".to_string(),
    };
    SimpleModule::new(api_version).with_check(doc, run_host_check)
}

fn run_host_check(_inputs: &Map<String, Value>) -> Result<Summary> {
    let elevated = shell::is_elevated();
    let mut entries = Map::new();
    entries.insert(
        "Host".to_string(),
        json!({
            "status": "INFO",
            "verbosity": 0,
            "result": {
                "Operating system": {"status": "INFO", "result": std::env::consts::OS},
                "Architecture": {"status": "INFO", "result": std::env::consts::ARCH},
                "Elevated privileges": {
                    "status": "INFO",
                    "result": elevated,
                    "message": if elevated { "" } else { "Checks requiring admin rights will be skipped." },
                },
            },
        }),
    );
    Summary::from_entries(entries)
}
