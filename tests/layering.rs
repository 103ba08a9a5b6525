// ABOUTME: Property tests for CRI-O configuration layering.
// ABOUTME: The last layer that sets default_runtime wins; silent layers change nothing.

mod support;

use crio_hook_installer::config::{ConfigPaths, ConfigResolver, DEFAULT_RUNTIME};
use crio_hook_installer::diagnostics::Diagnostics;
use crio_hook_installer::fs::MemoryFs;
use proptest::prelude::*;
use support::{DROP_IN_DIR, MAIN_CONFIG, runtime_toml};

const SILENT_FRAGMENT: &str = "[crio.runtime]\nlog_level = \"info\"\n";

fn runtime_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_.-]{0,15}"
}

/// A layer either sets the runtime or is silent about it.
fn layer() -> impl Strategy<Value = Option<String>> {
    prop::option::of(runtime_name())
}

fn write_layer(fs: MemoryFs, path: String, layer: &Option<String>) -> MemoryFs {
    match layer {
        Some(name) => fs.with_file(path, runtime_toml(name)),
        None => fs.with_file(path, SILENT_FRAGMENT),
    }
}

fn resolve(fs: &MemoryFs) -> String {
    let paths = ConfigPaths::default();
    let mut diagnostics = Diagnostics::default();
    ConfigResolver::new(fs, &paths)
        .resolve(&mut diagnostics)
        .unwrap()
        .to_string()
}

proptest! {
    #[test]
    fn last_setting_layer_wins(
        main in prop::option::of(layer()),
        fragments in prop::collection::vec(layer(), 0..8),
    ) {
        let mut fs = MemoryFs::new();
        if let Some(main) = &main {
            fs = write_layer(fs, MAIN_CONFIG.to_string(), main);
        }
        for (i, fragment) in fragments.iter().enumerate() {
            // Zero-padded so lexical order matches insertion order.
            fs = write_layer(fs, format!("{DROP_IN_DIR}/{i:02}-fragment.conf"), fragment);
        }

        let expected = fragments
            .iter()
            .rev()
            .chain(main.iter())
            .find_map(|layer| layer.clone())
            .unwrap_or_else(|| DEFAULT_RUNTIME.to_string());

        prop_assert_eq!(resolve(&fs), expected);
    }

    #[test]
    fn nested_fragments_follow_path_order(
        outer in runtime_name(),
        inner in runtime_name(),
    ) {
        // "a/z.conf" sorts before "b.conf" even though "z" > "b".
        let fs = MemoryFs::new()
            .with_file(format!("{DROP_IN_DIR}/a/z.conf"), runtime_toml(&inner))
            .with_file(format!("{DROP_IN_DIR}/b.conf"), runtime_toml(&outer));

        prop_assert_eq!(resolve(&fs), outer);
    }
}
