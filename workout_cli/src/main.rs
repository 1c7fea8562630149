use chrono::{NaiveDate, Weekday};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use workout_core::*;

#[derive(Parser)]
#[command(name = "workout")]
#[command(about = "Create, edit and plan workouts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the store file
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Act as this user instead of the configured one
    #[arg(long, global = true)]
    user: Option<String>,

    /// Log progress at INFO level
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Edits applied to the draft before saving
#[derive(Args)]
struct DraftArgs {
    /// Template to fill the workout from
    #[arg(long)]
    template: Option<String>,

    /// How many template exercises to take (defaults to all)
    #[arg(long, requires = "template")]
    length: Option<usize>,

    /// Exercise to append: a catalog id, or the name of a new exercise
    #[arg(long = "exercise")]
    exercises: Vec<String>,

    /// Exercise to remove, by id or name (first match only)
    #[arg(long = "remove")]
    removals: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available templates
    Templates,

    /// List the built-in exercises
    Exercises,

    /// Create a new workout
    Create {
        #[arg(long)]
        title: String,

        #[command(flatten)]
        draft: DraftArgs,
    },

    /// Edit (and optionally rename) a workout
    Edit {
        /// Current title of the workout
        workout: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        #[command(flatten)]
        draft: DraftArgs,
    },

    /// List your workouts
    List,

    /// Show one workout and where it is planned
    Show { title: String },

    /// Delete a workout (planned copies stay)
    Delete { title: String },

    /// Plan a workout into a slot (a date, a weekday or any key)
    Plan { slot: String, title: String },

    /// Clear a planner slot
    Unplan { slot: String },

    /// Show the planner
    Planner,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        workout_core::logging::init();
    } else {
        workout_core::logging::init_with_level("warn");
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!("Command failed: {}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load()?;
    let store_path = cli.store.unwrap_or_else(|| config.store.path.clone());
    let store = JsonFileStore::new(store_path);

    let auth = match cli.user {
        Some(user) => StaticAuth::signed_in(UserId::new(user)?),
        None => config.auth()?,
    };

    let catalog = get_default_catalog();
    if let Err(e) = catalog.ensure_valid() {
        eprintln!("Catalog validation errors:");
        for error in catalog.validate() {
            eprintln!("  - {}", error);
        }
        return Err(e);
    }
    if config.templates.seed_defaults {
        TemplateStore::new(&store).seed(&catalog.templates)?;
    }

    let repo = || open_repository(&store, &auth, &config);

    match cli.command {
        Commands::Templates => cmd_templates(&store),
        Commands::Exercises => cmd_exercises(catalog),
        Commands::Create { title, draft } => {
            let mut workflow = SaveWorkflow::create(repo()?);
            workflow.set_title(title);
            cmd_save(&store, catalog, workflow, draft)
        }
        Commands::Edit {
            workout,
            title,
            draft,
        } => {
            let repo = repo()?;
            let Some(existing) = repo.get(&workout)? else {
                eprintln!("No workout named \"{}\"", workout);
                return Ok(ExitCode::FAILURE);
            };
            let mut workflow = SaveWorkflow::edit(repo, &existing);
            if let Some(title) = title {
                workflow.set_title(title);
            }
            cmd_save(&store, catalog, workflow, draft)
        }
        Commands::List => cmd_list(&repo()?),
        Commands::Show { title } => cmd_show(&repo()?, &title),
        Commands::Delete { title } => cmd_delete(&repo()?, &title),
        Commands::Plan { slot, title } => cmd_plan(&repo()?, &parse_slot(&slot)?, &title),
        Commands::Unplan { slot } => cmd_unplan(&repo()?, &parse_slot(&slot)?),
        Commands::Planner => cmd_planner(&repo()?),
    }
}

/// Workouts of the signed-in user; only per-user commands need one
fn open_repository<'s>(
    store: &'s JsonFileStore,
    auth: &StaticAuth,
    config: &Config,
) -> Result<WorkoutRepository<'s, JsonFileStore>> {
    Ok(WorkoutRepository::for_current_user(store, auth)?.with_scan_timeout(config.scan_timeout()))
}

fn cmd_templates(store: &JsonFileStore) -> Result<ExitCode> {
    let templates = TemplateStore::new(store).list()?;
    if templates.is_empty() {
        println!("No templates available.");
    }
    for (name, template) in templates {
        println!("{:<14} {} exercises", name, template.len());
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_exercises(catalog: &Catalog) -> Result<ExitCode> {
    for exercise in catalog.exercises.values() {
        println!("{:<20} {}", exercise.id(), exercise.name());
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_save(
    store: &JsonFileStore,
    catalog: &Catalog,
    mut workflow: SaveWorkflow<'_, JsonFileStore>,
    args: DraftArgs,
) -> Result<ExitCode> {
    if let Some(name) = &args.template {
        let templates = TemplateStore::new(store);
        let template = templates.fetch(name)?;
        let requested = args.length.unwrap_or(template.len());
        let length = clamp_length(requested, &template);
        if length != requested {
            println!(
                "Template {} has {} exercises, using {}",
                name,
                template.len(),
                length
            );
        }
        workflow.apply_template(&templates, name, length)?;
    }

    for arg in &args.exercises {
        let exercise = catalog
            .exercise(arg)
            .cloned()
            .unwrap_or_else(|| Exercise::adhoc(arg.as_str()));
        workflow.add_exercise(exercise);
    }

    for arg in &args.removals {
        let found = workflow
            .draft()
            .exercises()
            .iter()
            .find(|e| e.id() == arg.as_str() || e.name() == arg.as_str())
            .cloned();
        match found {
            Some(exercise) => workflow.remove_exercise(&exercise),
            None => println!("\"{}\" is not in the workout", arg),
        }
    }

    let outcome = workflow.save()?;
    println!(
        "✓ Saved workout \"{}\" ({} exercises)",
        outcome.workout.title,
        outcome.workout.len()
    );
    if let Some(old) = &outcome.renamed_from {
        println!(
            "  Renamed from \"{}\", {} planner slots updated",
            old,
            outcome.planner_slots.len()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_list(repo: &WorkoutRepository<'_, JsonFileStore>) -> Result<ExitCode> {
    let workouts = repo.list()?;
    if workouts.is_empty() {
        println!("No workouts yet.");
    }
    for workout in workouts {
        println!("{:<24} {} exercises", workout.title, workout.len());
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_show(repo: &WorkoutRepository<'_, JsonFileStore>, title: &str) -> Result<ExitCode> {
    let Some(workout) = repo.get(title)? else {
        eprintln!("No workout named \"{}\"", title);
        return Ok(ExitCode::FAILURE);
    };

    println!("{}", workout.title);
    for (i, exercise) in workout.exercises.iter().enumerate() {
        println!("  {}. {}", i + 1, exercise.name());
    }

    let slots = repo.slots_referencing(title)?;
    if !slots.is_empty() {
        let slots: Vec<&str> = slots.iter().map(SlotKey::as_str).collect();
        println!("Planned: {}", slots.join(", "));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_delete(repo: &WorkoutRepository<'_, JsonFileStore>, title: &str) -> Result<ExitCode> {
    if repo.delete(title)? {
        println!("✓ Deleted workout \"{}\"", title);
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("No workout named \"{}\"", title);
        Ok(ExitCode::FAILURE)
    }
}

fn cmd_plan(
    repo: &WorkoutRepository<'_, JsonFileStore>,
    slot: &SlotKey,
    title: &str,
) -> Result<ExitCode> {
    let Some(workout) = repo.get(title)? else {
        eprintln!("No workout named \"{}\"", title);
        return Ok(ExitCode::FAILURE);
    };
    repo.assign(slot, &workout)?;
    println!("✓ Planned \"{}\" on {}", workout.title, slot);
    Ok(ExitCode::SUCCESS)
}

fn cmd_unplan(repo: &WorkoutRepository<'_, JsonFileStore>, slot: &SlotKey) -> Result<ExitCode> {
    if repo.clear_slot(slot)? {
        println!("✓ Cleared {}", slot);
    } else {
        println!("Nothing planned on {}", slot);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_planner(repo: &WorkoutRepository<'_, JsonFileStore>) -> Result<ExitCode> {
    let planner = repo.planner()?;
    if planner.is_empty() {
        println!("Nothing planned.");
    }
    for (slot, workout) in planner {
        println!("{:<12} {}", slot.as_str(), workout.title);
    }
    Ok(ExitCode::SUCCESS)
}

/// Dates (`2024-03-09`) and weekdays (`mon`, `Monday`) get canonical keys
fn parse_slot(arg: &str) -> Result<SlotKey> {
    if let Ok(date) = NaiveDate::parse_from_str(arg, "%Y-%m-%d") {
        return Ok(SlotKey::for_date(date));
    }
    if let Ok(day) = arg.parse::<Weekday>() {
        return Ok(SlotKey::for_weekday(day));
    }
    SlotKey::new(arg)
}
