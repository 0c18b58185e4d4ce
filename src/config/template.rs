//! Commented starter configuration written by `mobperf init`

/// Render the starter `.mobperf.toml` for `package`.
///
/// Everything except the package is commented out and shows the built-in
/// default, so the file resolves to exactly the defaults until edited.
pub fn starter_config(package: &str) -> String {
    format!(
        r#"# mobperf configuration
#
# Commands are argv arrays (no shell). Placeholders:
#   {{package}} {{activity}} {{configuration}} {{project}} {{output}} {{run}} {{run_dir}}

package = "{package}"
# activity = ".MainActivity"
# configuration = "Release"
# repetitions = 5
# output-dir = "perf-results/latest"

[commands]
# build = ["dotnet", "build", "-c", "{{configuration}}", "-f", "net8.0-android"]
# install = ["dotnet", "build", "-t:Install", "-c", "{{configuration}}", "-f", "net8.0-android"]
# launch = ["adb", "shell", "am", "start", "-W", "-n", "{{package}}/{{activity}}"]
# force-stop = ["adb", "shell", "am", "force-stop", "{{package}}"]   # [] disables
# memory = ["adb", "shell", "dumpsys", "meminfo", "{{package}}"]     # [] disables

[timeouts]
# build-secs = 600
# deploy-secs = 300
# launch-secs = 60
# profiler-attach-secs = 2
# profiler-detach-secs = 60
# monitor-window-secs = 10

[policy]
# max-consecutive-failures = 3   # 0 never aborts
# abort-on-build-failure = false

# Attached with --managed-profile / --native-profile.
# [profilers.managed]
# attach = ["dotnet-trace", "collect", "--diagnostic-port", "127.0.0.1:9000,suspend", "-o", "{{run_dir}}/managed.nettrace"]
# artifact = "{{run_dir}}/managed.nettrace"
#
# [profilers.native]
# attach = ["simpleperf-record", "{{package}}", "{{run_dir}}/perf.data"]
# detach = ["simpleperf-stop", "{{package}}"]
# artifact = "{{run_dir}}/perf.data"

[compare]
# min-samples = 2
# noise-multiplier = 2.0
# min-change-percent = 5.0
# zero-baseline-abs-threshold = 0.0
# significance-test = true
# alpha = 0.05

[compare.polarity]
# "native.fps" = "lower-is-worse"
"#,
        package = package
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::ConfigFile;
    use crate::config::resolver::{ConfigResolver, RunOverrides};
    use std::path::Path;

    #[test]
    fn test_starter_config_parses_to_package_only() {
        let config: ConfigFile = toml_edit::de::from_str(&starter_config("com.example.app")).unwrap();

        assert_eq!(
            config,
            ConfigFile {
                package: Some("com.example.app".to_string()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_starter_config_resolves() {
        let config: ConfigFile = toml_edit::de::from_str(&starter_config("com.example.app")).unwrap();
        let resolved =
            ConfigResolver::resolve_run(Path::new("/work/app"), &config, &RunOverrides::default())
                .unwrap();

        assert_eq!(resolved.package_name, "com.example.app");
    }

    #[test]
    fn test_starter_config_keeps_placeholders_literal() {
        assert!(starter_config("x").contains("\"{package}/{activity}\""));
    }
}
