//! Profile management commands.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Subcommand};
use eegspec_config::{
    Profile, ProfileSource, ensure_user_profiles_dir, is_factory_profile, list_all_profile_names,
    list_user_profiles, profile_name_from_path, resolve_profile_with_source, user_config_dir,
    user_profiles_dir, validate_profile,
};

/// Manage analysis profiles.
#[derive(Args)]
pub struct ProfilesArgs {
    #[command(subcommand)]
    command: ProfilesCommand,
}

#[derive(Subcommand)]
enum ProfilesCommand {
    /// List every available profile
    List,

    /// Print a profile as TOML
    Show {
        /// Profile name or path
        name: String,
    },

    /// Copy a profile into the user profiles directory for editing
    Copy {
        /// Profile to copy (name or path)
        source: String,

        /// Name of the copy (default: the source name)
        #[arg(long)]
        name: Option<String>,

        /// Overwrite an existing user profile
        #[arg(long)]
        force: bool,
    },

    /// Check a profile file for errors
    Validate {
        /// Profile TOML file
        file: PathBuf,
    },

    /// Show the configuration directories
    Paths,
}

/// Run the profiles command.
pub fn run(args: ProfilesArgs) -> anyhow::Result<()> {
    match args.command {
        ProfilesCommand::List => list(),
        ProfilesCommand::Show { name } => show(&name),
        ProfilesCommand::Copy {
            source,
            name,
            force,
        } => copy(&source, name, force),
        ProfilesCommand::Validate { file } => validate(&file),
        ProfilesCommand::Paths => {
            println!("Config:   {}", user_config_dir().display());
            println!("Profiles: {}", user_profiles_dir().display());
            Ok(())
        }
    }
}

fn list() -> anyhow::Result<()> {
    let user: Vec<String> = list_user_profiles()
        .iter()
        .filter_map(|p| profile_name_from_path(p))
        .collect();
    for name in list_all_profile_names() {
        let tag = match (user.contains(&name), is_factory_profile(&name)) {
            (true, true) => "user, overrides factory",
            (true, false) => "user",
            _ => "factory",
        };
        println!("{name:<20} ({tag})");
    }
    Ok(())
}

fn show(name: &str) -> anyhow::Result<()> {
    let (profile, source) = resolve_profile_with_source(name)
        .with_context(|| format!("failed to load profile '{name}'"))?;
    match source {
        ProfileSource::File(path) => println!("# {}", path.display()),
        ProfileSource::Factory => println!("# factory profile"),
    }
    print!("{}", profile.to_toml()?);
    Ok(())
}

fn copy(source: &str, name: Option<String>, force: bool) -> anyhow::Result<()> {
    let (mut profile, _) = resolve_profile_with_source(source)
        .with_context(|| format!("failed to load profile '{source}'"))?;
    if let Some(name) = name {
        profile.name = name;
    }

    let dir = ensure_user_profiles_dir()?;
    let path = dir.join(format!("{}.toml", profile.name));
    if path.exists() && !force {
        anyhow::bail!(
            "'{}' already exists (use --force to overwrite)",
            path.display()
        );
    }
    profile.save(&path)?;
    println!("Saved '{}' to {}", profile.name, path.display());
    Ok(())
}

fn validate(file: &PathBuf) -> anyhow::Result<()> {
    let profile = Profile::load(file)
        .with_context(|| format!("failed to load '{}'", file.display()))?;
    validate_profile(&profile).with_context(|| format!("profile '{}' is invalid", profile.name))?;
    println!("{}: OK", profile.name);
    Ok(())
}
