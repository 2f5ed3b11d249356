// ABOUTME: Integration tests for run configuration parsing and discovery.
// ABOUTME: Tests YAML parsing, env value resolution, and conversion to process arguments.

use dockproc::Execution;
use dockproc::config::*;
use dockproc::mount::{Mount, MountKind};
use dockproc::runtime::Machine;
use dockproc::{Error, ErrorKind};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

mod parsing {
    use super::*;

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config = RunConfig::from_yaml("{}").unwrap();
        assert!(config.image.is_none());
        assert!(config.machine.is_none());
        assert!(config.env.is_empty());
        assert_eq!(config.retry, 0);
        assert!(config.remove);
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
image: registry.local:5000/team/tool:1.2
name: nightly-report
machine:
  host: tcp://10.0.0.5:2376
  cert_path: /etc/docker/certs
  version: "1.41"
  timeout: 30s
env:
  MODE: batch
  TOKEN:
    env: REPORT_TOKEN
    default: unset
mounts:
  - /srv/reports:/out
  - cache:/cache:ro
retry: 3
remove: false
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.image.as_ref().unwrap().as_str(),
            "registry.local:5000/team/tool:1.2"
        );
        assert_eq!(config.name.as_deref(), Some("nightly-report"));

        let machine = config.machine.as_ref().unwrap();
        assert_eq!(machine.host(), "tcp://10.0.0.5:2376");
        assert_eq!(
            machine.cert_path().unwrap().to_str(),
            Some("/etc/docker/certs")
        );
        assert_eq!(machine.version(), "1.41");
        assert_eq!(machine.timeout(), Duration::from_secs(30));

        assert_eq!(
            config.env.get("MODE"),
            Some(&EnvValue::Literal("batch".to_string()))
        );
        assert_eq!(
            config.env.get("TOKEN"),
            Some(&EnvValue::FromHost {
                env: "REPORT_TOKEN".to_string(),
                default: Some("unset".to_string()),
            })
        );
        assert_eq!(config.mounts.len(), 2);
        assert_eq!(config.mounts[1].kind(), MountKind::Volume);
        assert_eq!(config.retry, 3);
        assert!(!config.remove);
    }

    #[test]
    fn exec_section_builds_execution() {
        let yaml = r#"
exec:
  script: ./scripts/setup.sh
  interpreter: bash
  inspect: true
  env:
    STAGE: build
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        let spec = config.exec.clone().unwrap();
        assert_eq!(spec.script.as_deref(), Some(Path::new("./scripts/setup.sh")));

        let execution = Execution::try_from(spec).unwrap();
        assert_eq!(execution.script_path(), Some(Path::new("./scripts/setup.sh")));
        assert_eq!(execution.env(), ["STAGE=build".to_string()]);
        assert!(execution.inspect_requested());
    }

    #[test]
    fn exec_section_with_both_commands_is_rejected() {
        let config =
            RunConfig::from_yaml("exec:\n  inline: make\n  script: build.sh\n").unwrap();
        let err = Execution::try_from(config.exec.unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[test]
    fn invalid_image_returns_error() {
        let err = RunConfig::from_yaml("image: \"bad image\"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn invalid_mount_returns_error() {
        assert!(RunConfig::from_yaml("mounts: [\"nowhere\"]").is_err());
    }

    #[test]
    fn invalid_timeout_returns_error() {
        assert!(RunConfig::from_yaml("machine:\n  timeout: soon\n").is_err());
    }
}

mod env_values {
    use super::*;

    #[test]
    fn literal_resolves_to_itself() {
        let value = EnvValue::Literal("x".to_string());
        assert_eq!(value.resolve().unwrap(), "x");
    }

    #[test]
    fn host_value_is_copied() {
        temp_env::with_var("DOCKPROC_TEST_VAR", Some("from_environment"), || {
            let value = EnvValue::FromHost {
                env: "DOCKPROC_TEST_VAR".to_string(),
                default: Some("fallback".to_string()),
            };
            assert_eq!(value.resolve().unwrap(), "from_environment");
        });
    }

    #[test]
    fn default_used_when_host_value_missing() {
        temp_env::with_var_unset("DOCKPROC_TEST_VAR", || {
            let value = EnvValue::FromHost {
                env: "DOCKPROC_TEST_VAR".to_string(),
                default: Some("fallback".to_string()),
            };
            assert_eq!(value.resolve().unwrap(), "fallback");
        });
    }

    #[test]
    fn missing_host_value_without_default_is_error() {
        temp_env::with_var_unset("DOCKPROC_TEST_VAR", || {
            let value = EnvValue::FromHost {
                env: "DOCKPROC_TEST_VAR".to_string(),
                default: None,
            };
            assert!(matches!(
                value.resolve().unwrap_err(),
                Error::MissingEnvVar(ref name) if name == "DOCKPROC_TEST_VAR"
            ));
        });
    }

    #[test]
    fn entries_are_sorted_by_key() {
        let map = HashMap::from([
            ("ZED".to_string(), EnvValue::Literal("1".to_string())),
            ("ALPHA".to_string(), EnvValue::Literal("2".to_string())),
        ]);
        assert_eq!(
            resolve_env_entries(&map).unwrap(),
            vec!["ALPHA=2".to_string(), "ZED=1".to_string()]
        );
    }

    #[test]
    fn flag_entries() {
        assert_eq!(parse_env_entry("A=b=c").unwrap(), "A=b=c");
        assert_eq!(parse_env_entry("EMPTY=").unwrap(), "EMPTY=");
        assert!(parse_env_entry("=oops").is_err());

        temp_env::with_var("DOCKPROC_FLAG_VAR", Some("copied"), || {
            assert_eq!(
                parse_env_entry("DOCKPROC_FLAG_VAR").unwrap(),
                "DOCKPROC_FLAG_VAR=copied"
            );
        });
    }
}

mod discovery {
    use super::*;
    use std::fs;

    #[test]
    fn finds_primary_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "image: alpine\n").unwrap();

        let config = RunConfig::discover(dir.path()).unwrap();
        assert_eq!(config.image.unwrap().as_str(), "alpine");
    }

    #[test]
    fn primary_file_wins_over_alternatives() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "image: first\n").unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_ALT), "image: second\n").unwrap();

        let config = RunConfig::discover(dir.path()).unwrap();
        assert_eq!(config.image.unwrap().as_str(), "first");
    }

    #[test]
    fn finds_file_in_config_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".dockproc")).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_DIR), "retry: 2\n").unwrap();

        assert_eq!(RunConfig::discover(dir.path()).unwrap().retry, 2);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RunConfig::discover(dir.path()).unwrap_err(),
            Error::ConfigNotFound(_)
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::discover_or_default(dir.path()).unwrap();
        assert!(config.remove);
        assert!(config.image.is_none());
    }

    #[test]
    fn broken_file_is_not_masked_by_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "retry: [").unwrap();
        assert!(RunConfig::discover_or_default(dir.path()).is_err());
    }
}

mod process_args {
    use super::*;

    #[test]
    fn resolves_env_and_carries_settings() {
        let yaml = r#"
name: job
machine:
  host: tcp://daemon:2375
env:
  B: two
  A: one
mounts:
  - /data:/data
retry: 4
"#;
        let args = RunConfig::from_yaml(yaml).unwrap().process_args().unwrap();

        assert_eq!(args.name, "job");
        assert_eq!(args.env, vec!["A=one".to_string(), "B=two".to_string()]);
        assert_eq!(args.mounts, vec![Mount::bind("/data", "/data")]);
        assert_eq!(args.retry, 4);
        assert_eq!(args.machine.unwrap().host(), "tcp://daemon:2375");
    }

    #[test]
    fn environment_machine_used_when_none_configured() {
        temp_env::with_vars(
            [
                ("DOCKER_HOST", Some("tcp://from-env:2376")),
                ("DOCKER_CERT_PATH", None),
            ],
            || {
                let args = RunConfig::default().process_args().unwrap();
                let machine = args.machine.unwrap();
                assert_eq!(machine.host(), "tcp://from-env:2376");
                assert!(machine.cert_path().is_none());
                assert_eq!(machine.version(), "");
            },
        );
    }

    #[test]
    fn unresolvable_env_fails() {
        temp_env::with_var_unset("DOCKPROC_MISSING", || {
            let config = RunConfig::from_yaml("env:\n  X:\n    env: DOCKPROC_MISSING\n").unwrap();
            assert!(matches!(
                config.process_args().unwrap_err(),
                Error::MissingEnvVar(_)
            ));
        });
    }
}
