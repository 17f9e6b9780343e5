//! Operator-facing banners and progress summaries.

use std::path::Path;

use crate::io::state::load_project_state;

pub fn print_session_header(project_dir: &Path, max_iterations: Option<u32>, resuming: bool) {
    println!("\n{}", "=".repeat(70));
    println!("  AUTONOMOUS CODING SESSION");
    println!("{}", "=".repeat(70));
    println!("\nProject: {}", project_dir.display());
    match max_iterations {
        Some(max) => println!("Iterations this session: {max}"),
        None => println!("Iterations this session: unlimited"),
    }
    if resuming {
        println!("Mode: resuming existing project");
    } else {
        println!("Mode: fresh project");
    }
}

pub fn print_iteration_banner(project_dir: &Path, iteration: u32, max_iterations: Option<u32>) {
    println!("\n{}", "-".repeat(70));
    match max_iterations {
        Some(max) => println!("  ITERATION {iteration}/{max}"),
        None => println!("  ITERATION {iteration}"),
    }
    println!("{}", "-".repeat(70));
    print_progress_summary(project_dir);
}

/// Progress summary from the local marker. Advisory; the tracker itself is
/// the source of truth for issue states.
pub fn print_progress_summary(project_dir: &Path) {
    match load_project_state(project_dir) {
        Some(state) if state.initialized => {
            println!("Tracker: {} issues filed", state.total_issues);
            if let Some(meta) = &state.meta_issue_id {
                println!("Handoff issue: {meta}");
            }
        }
        _ => println!("Tracker not initialized yet; running project setup."),
    }
}

pub fn print_session_footer(project_dir: &Path, iterations_run: u32) {
    println!("\n{}", "=".repeat(70));
    println!("  SESSION COMPLETE");
    println!("{}", "=".repeat(70));
    println!("\nRan {iterations_run} iteration(s).");
    print_progress_summary(project_dir);
    println!("\nTo try the app:");
    println!("  cd {}", project_dir.display());
    println!("  npm install && npm run dev");
    println!("\nRun the harness again to continue from tracker state.");
}
