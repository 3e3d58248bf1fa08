mod application;
mod apply;
mod extract;
#[cfg(test)]
mod fake;
mod fetch;
mod interrupt;
mod logging;
mod options;
mod reconcile;
mod source;
mod watch;
mod zones;

use std::{future::Future, time::Duration};

use anyhow::{bail, Result};
use application::{handle_result, reconciler, runtime, set_up_logging};
use apply::ApplySummary;
use cfaccess_core::plan::{DeleteReason, Plan};
use clap::{CommandFactory as _, Parser, Subcommand};
use options::{Options, SourceArgs};

fn main() {
    let args = Args::parse();
    handle_result(run_args(args));
}

fn run_args(args: Args) -> Result<()> {
    match &args.command {
        Commands::GenerateMan => (|| {
            let cmd = Args::command();
            let man = clap_mangen::Man::new(cmd);
            let mut buffer: Vec<u8> = Default::default();
            man.render(&mut buffer)?;
            println!("{}", String::from_utf8(buffer)?);
            Ok(())
        })(),
        Commands::GenerateMarkdown => {
            let opts = clap_markdown::MarkdownOptions::new().show_footer(false);
            let markdown: String = clap_markdown::help_markdown_custom::<Args>(&opts);
            println!("{}", markdown);
            Ok(())
        }
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Args::command();
            clap_complete::generate(*shell, &mut cmd, "cfaccess", &mut std::io::stdout());
            Ok(())
        }
        Commands::Plan { source, json } => run(&args.options, plan(&args.options, source, *json)),
        Commands::Sync { source } => run(&args.options, sync(&args.options, source)),
        Commands::Watch { source, interval } => run(
            &args.options,
            watch(&args.options, source, Duration::from_secs(*interval)),
        ),
        Commands::Reconcile {
            source,
            namespace,
            name,
        } => run(&args.options, reconcile(&args.options, source, namespace, name)),
        Commands::Delete { namespace, name } => {
            run(&args.options, delete(&args.options, namespace, name))
        }
    }
}

/// Set up logging and run a command that talks to the remote service.
fn run(options: &Options, command: impl Future<Output = Result<()>>) -> Result<()> {
    set_up_logging(options)?;
    runtime()?.block_on(command)
}

async fn plan(options: &Options, source: &SourceArgs, json: bool) -> Result<()> {
    let objects = source::read_objects(&source.file)?;
    let plan = reconciler(options).await?.plan(&objects).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_plan(&plan);
    }
    Ok(())
}

async fn sync(options: &Options, source: &SourceArgs) -> Result<()> {
    let objects = source::read_objects(&source.file)?;
    let summary = reconciler(options).await?.sync(&objects).await;
    report(summary)
}

async fn watch(options: &Options, source: &SourceArgs, interval: Duration) -> Result<()> {
    let reconciler = reconciler(options).await?;
    let interrupt_state = interrupt::set_up_process_interrupt_handler()?;
    watch::watch(&reconciler, &source.file, interval, &interrupt_state).await
}

async fn reconcile(
    options: &Options,
    source: &SourceArgs,
    namespace: &str,
    name: &str,
) -> Result<()> {
    let objects = source::read_objects(&source.file)?;
    let reconciler = reconciler(options).await?;
    let summary = match objects
        .iter()
        .find(|o| o.namespace == namespace && o.name == name)
    {
        Some(object) => reconciler.reconcile_object(object).await,
        // Gone from the source, so its application goes too
        None => reconciler.delete_object(namespace, name).await,
    };
    report(summary)
}

async fn delete(options: &Options, namespace: &str, name: &str) -> Result<()> {
    let summary = reconciler(options)
        .await?
        .delete_object(namespace, name)
        .await;
    report(summary)
}

fn report(summary: ApplySummary) -> Result<()> {
    eprintln!("{}", summary);
    if summary.failed() > 0 {
        bail!("{} operations failed", summary.failed());
    }
    Ok(())
}

fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!("No changes.");
        return;
    }
    let apps = &plan.applications;
    for u in &apps.updates {
        println!(
            "~ application {} ({}) in {}: {}",
            u.spec.name,
            u.id,
            u.zone,
            u.changed_fields().join(", ")
        );
    }
    for d in &apps.deletes {
        let reason = match d.reason {
            DeleteReason::Orphaned => "orphaned",
            DeleteReason::Duplicate => "duplicate",
        };
        println!("- application {} ({}) in {}: {}", d.name, d.id, d.zone, reason);
    }
    for c in &apps.creates {
        println!(
            "+ application {} in {}: {} with {} policies",
            c.spec.name,
            c.zone,
            c.spec.domain,
            c.policies.len()
        );
    }
    let policies = &plan.policies;
    for u in &policies.updates {
        println!(
            "~ policy {} ({}) of {} at position {}: {}",
            u.policy.name, u.id, u.app_id, u.position, u.policy.decision
        );
    }
    for d in &policies.deletes {
        println!("- policy {} ({}) of {}", d.name, d.id, d.app_id);
    }
    for c in &policies.creates {
        println!(
            "+ policy {} of {} at position {}: {}",
            c.policy.name, c.app_id, c.position, c.policy.decision
        );
    }
}

/// Keep Cloudflare Access applications in sync with annotated ingress objects
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: Options,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the changes a sync would make, without making them
    Plan {
        #[command(flatten)]
        source: SourceArgs,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Make the applications of all managed zones match the source objects
    Sync {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Sync periodically until interrupted
    Watch {
        #[command(flatten)]
        source: SourceArgs,

        /// Seconds to wait after one cycle before starting the next
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },

    /// Reconcile the application of a single object
    Reconcile {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(long, default_value = "default")]
        namespace: String,

        #[arg(long)]
        name: String,
    },

    /// Delete the application of an object, in whichever zone it is
    Delete {
        #[arg(long, default_value = "default")]
        namespace: String,

        #[arg(long)]
        name: String,
    },

    /// Generate markdown documentation for cfaccess
    #[command(hide = true)]
    GenerateMarkdown,

    /// Generate a manpage for cfaccess
    #[command(hide = true)]
    GenerateMan,

    /// Generate shell completion for cfaccess
    #[command(hide = true)]
    GenerateCompletion {
        /// The shell to generate completion for
        #[arg(long)]
        shell: clap_complete::Shell,
    },
}
