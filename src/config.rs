//! Configuration loading and prompt construction.
//!
//! Collapsed from `worktrunk::config`'s two-file (project vs. user) split
//! to a single project-level `.milhouse/config.toml`, since the
//! orchestrator has no interactive per-developer preferences to store.
//! Prompt construction is a pure function of task + options, deliberately
//! outside the scheduler's control flow.

use std::path::Path;

use config::{Config as ConfigSource, File, FileFormat};
use minijinja::Environment;
use serde::{Deserialize, Serialize};

use crate::task::{ExecutionOptions, Task};

const DEFAULT_PROMPT_TEMPLATE: &str = "{{ title }}\n\
{%- if description %}\n\n{{ description }}{% endif %}\n\
{%- if skip_tests %}\n\nDo not run the test suite.{% endif %}\n\
{%- if skip_lint %}\n\nDo not run the linter.{% endif %}\n";

/// Top-level config file shape, all fields optional so an absent file (or
/// an absent section within it) falls back to [`ExecutionOptions::default`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawConfig {
    execution: PartialExecutionOptions,
    prompt_template: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct PartialExecutionOptions {
    parallel: Option<bool>,
    branch_per_task: Option<bool>,
    max_workers: Option<u32>,
    base_branch: Option<String>,
    skip_tests: Option<bool>,
    skip_lint: Option<bool>,
    fail_fast: Option<bool>,
    skip_merge: Option<bool>,
    max_retries: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Config {
    defaults: ExecutionOptions,
    prompt_template: String,
}

impl Config {
    /// Load `{work_dir}/.milhouse/config.toml`, if present, layering its
    /// values over [`ExecutionOptions::default`].
    pub fn load(work_dir: &Path) -> anyhow::Result<Self> {
        let config_path = work_dir.join(".milhouse").join("config.toml");

        let source = ConfigSource::builder()
            .add_source(File::new(&config_path.to_string_lossy(), FileFormat::Toml).required(false))
            .build()?;

        let raw: RawConfig = source.try_deserialize().unwrap_or_default();
        let mut defaults = ExecutionOptions::default();

        if let Some(v) = raw.execution.parallel {
            defaults.parallel = v;
        }
        if let Some(v) = raw.execution.branch_per_task {
            defaults.branch_per_task = v;
        }
        if let Some(v) = raw.execution.max_workers {
            defaults.max_workers = v;
        }
        if let Some(v) = raw.execution.base_branch {
            defaults.base_branch = v;
        }
        if let Some(v) = raw.execution.skip_tests {
            defaults.skip_tests = v;
        }
        if let Some(v) = raw.execution.skip_lint {
            defaults.skip_lint = v;
        }
        if let Some(v) = raw.execution.fail_fast {
            defaults.fail_fast = v;
        }
        if let Some(v) = raw.execution.skip_merge {
            defaults.skip_merge = v;
        }
        if let Some(v) = raw.execution.max_retries {
            defaults.max_retries = v;
        }

        Ok(Self {
            defaults,
            prompt_template: raw.prompt_template.unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string()),
        })
    }

    pub fn defaults(&self) -> &ExecutionOptions {
        &self.defaults
    }

    /// Render the agent prompt for `task` under `options`. A pure function:
    /// no filesystem or network access, no side effects.
    pub fn render_prompt(&self, task: &Task, options: &ExecutionOptions) -> anyhow::Result<String> {
        let mut env = Environment::new();
        env.add_template("prompt", &self.prompt_template)?;
        let tmpl = env.get_template("prompt")?;
        let rendered = tmpl.render(minijinja::context! {
            title => task.title,
            description => task.description,
            skip_tests => options.skip_tests,
            skip_lint => options.skip_lint,
        })?;
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskMetadata;

    fn sample_task() -> Task {
        Task {
            task_id: "t1".to_string(),
            title: "Fix login".to_string(),
            description: Some("The login button is unresponsive.".to_string()),
            status: crate::task::TaskStatus::Pending,
            priority: crate::task::TaskPriority::Medium,
            metadata: TaskMetadata::default(),
        }
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.defaults().max_workers, 4);
        assert_eq!(config.defaults().base_branch, "main");
    }

    #[test]
    fn load_applies_execution_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".milhouse")).unwrap();
        std::fs::write(
            dir.path().join(".milhouse").join("config.toml"),
            "[execution]\nmax_workers = 8\nbase_branch = \"develop\"\n",
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.defaults().max_workers, 8);
        assert_eq!(config.defaults().base_branch, "develop");
    }

    #[test]
    fn raw_config_round_trips_through_toml() {
        let raw = RawConfig {
            execution: PartialExecutionOptions {
                max_workers: Some(8),
                base_branch: Some("develop".to_string()),
                ..Default::default()
            },
            prompt_template: Some("{{ title }}".to_string()),
        };
        let serialized = toml::to_string(&raw).unwrap();
        assert!(serialized.contains("max_workers = 8"));
        let parsed: RawConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.execution.max_workers, Some(8));
        assert_eq!(parsed.prompt_template.as_deref(), Some("{{ title }}"));
    }

    #[test]
    fn render_prompt_includes_title_and_description() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        let options = ExecutionOptions::default();
        let prompt = config.render_prompt(&sample_task(), &options).unwrap();
        assert!(prompt.contains("Fix login"));
        assert!(prompt.contains("unresponsive"));
    }
}
