//! End-to-end scenario coverage, driven entirely through `scheduler::run`
//! so strategy selection itself is exercised rather than a strategy built
//! by hand. The unit tests beside each module cover the same scenario
//! numbers at the component level (naming, single-merge, safe-merge); this
//! file checks that the public entry point wires them together the same
//! way.

use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;

use milhouse::agent::DryRunAgentRunner;
use milhouse::cancellation::CancellationToken;
use milhouse::config::Config;
use milhouse::events::EventBus;
use milhouse::scheduler::{self, Hooks};
use milhouse::task::{ExecutionContext, ExecutionOptions, Task, TaskMetadata, TaskPriority, TaskStatus};

fn init_repo() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let run = |args: &[&str]| {
        Command::new("git")
            .args(args)
            .current_dir(dir.path())
            .output()
            .unwrap();
    };
    run(&["init", "-q", "-b", "main"]);
    run(&["config", "user.email", "test@example.com"]);
    run(&["config", "user.name", "Test"]);
    std::fs::write(dir.path().join("README.md"), "hello\n").unwrap();
    run(&["add", "."]);
    run(&["commit", "-q", "-m", "initial"]);
    dir
}

fn task(id: &str, parallel_group: Option<u32>) -> Task {
    Task {
        task_id: id.to_string(),
        title: format!("Task {id}"),
        description: None,
        status: TaskStatus::Pending,
        priority: TaskPriority::Medium,
        metadata: TaskMetadata {
            parallel_group,
            ..Default::default()
        },
    }
}

/// S1 — one task, dry run: completes instantly with no git side effects,
/// routed through `select_strategy`'s Sequential path (`parallel=false`).
#[test]
fn s1_sequential_dry_run_single_task_succeeds_instantly() {
    let dir = init_repo();
    let repo = milhouse::git::Repository::at(dir.path()).unwrap();
    let config = Config::load(dir.path()).unwrap();
    let events = EventBus::new();
    let hooks = Hooks::default();
    let agent = DryRunAgentRunner;

    let ctx = ExecutionContext {
        run_id: "run-s1".to_string(),
        work_dir: dir.path().to_path_buf(),
        engine: "test".to_string(),
        options: ExecutionOptions {
            dry_run: true,
            ..Default::default()
        },
        metadata: None,
        cancel: CancellationToken::new(),
    };

    let tasks = vec![task("T1", None)];
    let summary = scheduler::run(&tasks, &ctx, &agent, &config, &events, &hooks, &repo).unwrap();

    assert_eq!(summary.tasks_executed, 1);
    assert_eq!(summary.tasks_completed, 1);
    assert!(summary.all_succeeded);
    assert_eq!(summary.results[0].duration, Duration::ZERO);
    // Sequential strategy never touches the worktree layout.
    assert!(!dir.path().join(".milhouse").exists());
}

/// S2 — a later parallel group never starts before the earlier one has
/// fully completed, and each task gets its own worktree under the managed
/// layout. `select_strategy` picks ParallelWorktree because every task
/// carries an explicit `parallelGroup`.
#[test]
fn s2_later_group_waits_for_earlier_group_through_public_entry_point() {
    let dir = init_repo();
    let repo = milhouse::git::Repository::at(dir.path()).unwrap();
    let config = Config::load(dir.path()).unwrap();
    let events = EventBus::new();
    let agent = DryRunAgentRunner;

    let group0_completed = Arc::new(AtomicUsize::new(0));
    let group1_started_early = Arc::new(AtomicBool::new(false));
    let worktrees_created = Arc::new(AtomicUsize::new(0));

    let g0_done = group0_completed.clone();
    let hooks_on_complete: Box<dyn Fn(&milhouse::task::TaskExecutionResult) + Send + Sync> =
        Box::new(move |result| {
            if result.task_id == "T1" || result.task_id == "T2" {
                g0_done.fetch_add(1, Ordering::SeqCst);
            }
        });

    let g0_done_for_start = group0_completed.clone();
    let g1_early = group1_started_early.clone();
    let created_counter = worktrees_created.clone();
    let hooks = Hooks {
        on_task_complete: Some(hooks_on_complete),
        on_task_start: Some(Box::new(move |task_id| {
            if task_id == "T3" && g0_done_for_start.load(Ordering::SeqCst) < 2 {
                g1_early.store(true, Ordering::SeqCst);
            }
        })),
        on_worktree_create: Some(Box::new(move |_task_id, path, _branch| {
            assert!(milhouse::worktree::naming::is_managed_worktree_path(path));
            created_counter.fetch_add(1, Ordering::SeqCst);
        })),
        ..Default::default()
    };

    let ctx = ExecutionContext {
        run_id: "run-s2".to_string(),
        work_dir: dir.path().to_path_buf(),
        engine: "test".to_string(),
        options: ExecutionOptions {
            parallel: true,
            branch_per_task: true,
            max_workers: 4,
            skip_merge: true,
            ..Default::default()
        },
        metadata: None,
        cancel: CancellationToken::new(),
    };

    let tasks = vec![task("T1", Some(0)), task("T2", Some(0)), task("T3", Some(1))];
    let summary = scheduler::run(&tasks, &ctx, &agent, &config, &events, &hooks, &repo).unwrap();

    assert_eq!(summary.tasks_executed, 3);
    assert!(summary.all_succeeded);
    assert_eq!(group0_completed.load(Ordering::SeqCst), 2, "both group-0 tasks must have completed");
    assert!(!group1_started_early.load(Ordering::SeqCst), "T3 must not start before group 0 finishes");
    assert_eq!(worktrees_created.load(Ordering::SeqCst), 3, "one managed worktree per task");

    // Each worktree was clean (DryRunAgentRunner touches nothing), so
    // cleanup_group removes every one of them once its group's merges are
    // done; nothing should be left behind.
    let worktrees_root = dir.path().join(".milhouse").join("work").join("worktrees");
    let remaining = std::fs::read_dir(&worktrees_root).map(|it| it.count()).unwrap_or(0);
    assert_eq!(remaining, 0, "clean worktrees are removed after their group finishes");
}

/// S6 — `failFast` stops the next group from starting once a task in the
/// current group has failed, exercised on the parallel path this time (the
/// sequential path is covered in `scheduler::sequential`'s own unit test).
#[test]
fn s6_fail_fast_stops_next_group_in_parallel_strategy() {
    let dir = init_repo();
    let repo = milhouse::git::Repository::at(dir.path()).unwrap();
    let config = Config::load(dir.path()).unwrap();
    let events = EventBus::new();
    let hooks = Hooks::default();

    struct FailingAgent;
    impl milhouse::agent::AgentRunner for FailingAgent {
        fn execute(
            &self,
            _prompt: &str,
            _work_dir: &std::path::Path,
            _task_id: &str,
            _cancel: &CancellationToken,
        ) -> milhouse::agent::AgentResult {
            milhouse::agent::AgentResult {
                success: false,
                output: String::new(),
                steps: vec![],
                duration: Duration::ZERO,
                exit_code: Some(1),
                error: Some("intentional failure".to_string()),
            }
        }
    }

    let agent = FailingAgent;
    let ctx = ExecutionContext {
        run_id: "run-s6".to_string(),
        work_dir: dir.path().to_path_buf(),
        engine: "test".to_string(),
        options: ExecutionOptions {
            parallel: true,
            branch_per_task: true,
            fail_fast: true,
            skip_merge: true,
            ..Default::default()
        },
        metadata: None,
        cancel: CancellationToken::new(),
    };

    let tasks = vec![task("T1", Some(0)), task("T2", Some(1))];
    let summary = scheduler::run(&tasks, &ctx, &agent, &config, &events, &hooks, &repo).unwrap();

    assert_eq!(summary.tasks_executed, 1, "group 1's T2 must never run once group 0 fails fail-fast");
    assert!(!summary.all_succeeded);
    assert_eq!(summary.results[0].task_id, "T1");
}
