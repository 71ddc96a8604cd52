//! Subcommand handlers

use std::io::{self, BufRead, Write};
use tracing::info;

use credvault_core::password::{check_strength, generate, GeneratorOptions, StrengthReport};
use credvault_core::{
    AutoLockSettings, ClipboardGuard, CredentialMetadata, CredentialRecord, CredentialUpdate,
    Result, SecretString, Vault, VaultError, VaultState,
};

use crate::{Command, GenerateArgs};

pub async fn run(vault: &mut Vault, password: Option<&str>, command: Command) -> Result<()> {
    match command {
        Command::Init => init(vault, password).await,
        Command::Add {
            platform,
            username,
            tags,
            notes,
            url,
            generate,
        } => {
            unlock(vault, password).await?;
            let mut metadata = CredentialMetadata::new(&platform, &username).with_tags(tags);
            metadata.notes = notes;
            metadata.login_url = url;

            let secret = if generate {
                let secret = credvault_core::generate(&GeneratorOptions::default())?;
                println!("Generated password: {}", secret.expose());
                secret
            } else {
                prompt_secret("Password: ")?
            };

            let record = vault.credentials().add(metadata, secret.expose()).await?;
            println!("Added {} ({})", record.platform, record.id);
            Ok(())
        }
        Command::List { tags, query, json } => {
            let records = vault
                .credentials()
                .filter(query.as_deref().unwrap_or(""), &tags)
                .await;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_table(&records);
            }
            Ok(())
        }
        Command::Search { query } => {
            print_table(&vault.credentials().search(&query).await);
            Ok(())
        }
        Command::Show { id, reveal } => {
            let record = vault.credentials().get(id).await?;
            print_record(&record);
            if reveal {
                unlock(vault, password).await?;
                let secret = vault.credentials().reveal_password(id).await?;
                println!("Password:  {}", secret.expose());
            }
            Ok(())
        }
        Command::Copy { id, no_clear } => {
            unlock(vault, password).await?;
            let secret = vault.credentials().reveal_password(id).await?;

            let guard = ClipboardGuard::system()?;
            guard.copy_secret(&secret)?;
            if no_clear {
                guard.cancel()?;
                println!("Password copied to clipboard");
            } else {
                println!("Password copied; clipboard clears in 60 seconds");
                guard.settle().await?;
            }
            Ok(())
        }
        Command::Edit {
            id,
            platform,
            username,
            tags,
            clear_tags,
            notes,
            url,
            new_password,
        } => {
            let update =
                edit_update(platform, username, tags, clear_tags, notes, url, new_password)?;

            let secret = if new_password {
                unlock(vault, password).await?;
                Some(prompt_secret("New password: ")?)
            } else {
                None
            };

            let record = vault
                .credentials()
                .update(id, update, secret.as_ref().map(|s| s.expose()))
                .await?;
            println!("Updated {} ({})", record.platform, record.id);
            Ok(())
        }
        Command::Delete { id } => {
            vault.credentials().delete(id).await?;
            println!("Deleted {}", id);
            Ok(())
        }
        Command::Export { output } => {
            let blob = vault.credentials().export_all().await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, blob).await?;
                    println!("Exported to {}", path.display());
                }
                None => println!("{}", blob),
            }
            Ok(())
        }
        Command::Import { file } => {
            let blob = tokio::fs::read_to_string(&file).await?;
            let count = vault.credentials().import_all(&blob).await?;
            println!("Imported {} credentials", count);
            Ok(())
        }
        Command::Generate(args) => {
            let secret = generate(&generator_options(&args))?;
            println!("{}", secret.expose());
            Ok(())
        }
        Command::Strength { candidate } => {
            let candidate = match candidate {
                Some(p) => SecretString::new(p),
                None => prompt_secret("Password to rate: ")?,
            };
            print_strength(&check_strength(candidate.expose()));
            Ok(())
        }
        Command::AutoLock { minutes, disable } => {
            let next = match (minutes, disable) {
                (_, true) => Some(AutoLockSettings::disabled()),
                (Some(m), false) => Some(AutoLockSettings::after_minutes(m)),
                (None, false) => None,
            };
            if let Some(auto_lock) = next {
                vault.set_auto_lock(auto_lock).await?;
            }
            match vault.settings().auto_lock().timeout() {
                Some(timeout) => println!("Auto-lock after {} minutes", timeout.as_secs() / 60),
                None => println!("Auto-lock disabled"),
            }
            Ok(())
        }
        Command::Reset { yes } => {
            if !yes && !confirm("Delete the vault and all credentials? Type 'yes' to confirm: ")? {
                println!("Aborted");
                return Ok(());
            }
            vault.reset().await?;
            println!("Vault reset");
            Ok(())
        }
    }
}

async fn init(vault: &Vault, password: Option<&str>) -> Result<()> {
    if vault.state().await? != VaultState::NotInitialized {
        return Err(VaultError::AlreadyInitialized);
    }

    let passphrase = match password {
        Some(p) => SecretString::from(p),
        None => {
            let first = prompt_secret("New master passphrase: ")?;
            let second = prompt_secret("Repeat passphrase: ")?;
            if first.expose() != second.expose() {
                return Err(VaultError::Configuration("passphrases do not match".to_string()));
            }
            first
        }
    };

    let report = check_strength(passphrase.expose());
    println!("Passphrase strength: {} ({}/100)", report.strength, report.score);

    vault.setup(passphrase.expose()).await?;
    info!("Created vault");
    println!("Vault created");
    Ok(())
}

async fn unlock(vault: &Vault, password: Option<&str>) -> Result<()> {
    match vault.state().await? {
        VaultState::NotInitialized => Err(VaultError::NotInitialized),
        VaultState::Unlocked => Ok(()),
        VaultState::Locked => match password {
            Some(p) => vault.unlock(p).await,
            None => {
                let passphrase = prompt_secret("Master passphrase: ")?;
                vault.unlock(passphrase.expose()).await
            }
        },
    }
}

fn edit_update(
    platform: Option<String>,
    username: Option<String>,
    tags: Vec<String>,
    clear_tags: bool,
    notes: Option<String>,
    url: Option<String>,
    new_password: bool,
) -> Result<CredentialUpdate> {
    let update = CredentialUpdate {
        platform,
        username,
        tags: if clear_tags {
            Some(Vec::new())
        } else if tags.is_empty() {
            None
        } else {
            Some(tags)
        },
        notes: notes.map(Some),
        login_url: url.map(Some),
    };
    if update.is_empty() && !new_password {
        return Err(VaultError::Configuration("nothing to change".to_string()));
    }
    Ok(update)
}

fn generator_options(args: &GenerateArgs) -> GeneratorOptions {
    GeneratorOptions {
        length: args.length,
        uppercase: !args.no_upper,
        lowercase: !args.no_lower,
        digits: !args.no_digits,
        symbols: !args.no_symbols,
    }
}

fn prompt_secret(prompt: &str) -> Result<SecretString> {
    Ok(SecretString::new(rpassword::prompt_password(prompt)?))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

fn print_table(records: &[CredentialRecord]) {
    if records.is_empty() {
        println!("No credentials");
        return;
    }
    for record in records {
        println!(
            "{}  {:<24} {:<28} {}",
            record.id,
            record.platform,
            record.username,
            record.tags.join(",")
        );
    }
}

fn print_record(record: &CredentialRecord) {
    println!("Id:        {}", record.id);
    println!("Platform:  {}", record.platform);
    println!("Username:  {}", record.username);
    if !record.tags.is_empty() {
        println!("Tags:      {}", record.tags.join(", "));
    }
    if let Some(url) = &record.login_url {
        println!("URL:       {}", url);
    }
    if let Some(notes) = &record.notes {
        println!("Notes:     {}", notes);
    }
    println!("Created:   {}", record.created_at.to_rfc3339());
    println!("Updated:   {}", record.updated_at.to_rfc3339());
}

fn print_strength(report: &StrengthReport) {
    println!("Strength: {} ({}/100)", report.strength, report.score);
    for (problem, fix) in report.feedback.iter().zip(&report.suggestions) {
        println!("  - {}: {}", problem, fix);
    }
}
