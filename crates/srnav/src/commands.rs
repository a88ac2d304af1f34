//! srnav command implementations

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use srnav_config::{self, paths::safe_filename, Config, ProviderConfig, OPENROUTER_API_BASE};
use srnav_navigator::{
    ActionDecision, ActionGate, AutoApprove, GateVerdict, LlmOracle, RunMode, TaskReport,
    TaskRequest, TaskRunner,
};
use srnav_provider::OpenRouterProvider;
use srnav_screen::{HttpScreenReader, ReaderSession};

use crate::RunArgs;

const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

/// Read line from stdin; empty on EOF or error
fn read_line() -> String {
    let mut input = String::new();
    if std::io::stdin().read_line(&mut input).is_err() {
        return String::new();
    }
    input.trim().to_string()
}

/// Read password from stdin (masked input)
fn read_password() -> String {
    rpassword::read_password().unwrap_or_else(|_| read_line())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    std::io::stdout().flush()?;
    Ok(read_line())
}

/// Asks on the terminal before every activate and type
struct TerminalGate;

fn ask_verdict(question: &str) -> GateVerdict {
    loop {
        print!("{} [y/n/s]: ", question);
        if std::io::stdout().flush().is_err() {
            return GateVerdict::Reject;
        }

        let mut input = String::new();
        match std::io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => return GateVerdict::Reject,
            Ok(_) => {}
        }
        if let Some(verdict) = GateVerdict::from_answer(&input) {
            return verdict;
        }
        println!("Answer y (do it), n (don't) or s (skip to next element).");
    }
}

#[async_trait]
impl ActionGate for TerminalGate {
    async fn review(&self, step: usize, decision: &ActionDecision) -> GateVerdict {
        let mut question = format!("\n◆ Step {}: {}", step, decision.action);
        if let Some(text) = decision.parameter_text() {
            question.push_str(&format!(" {:?}", text));
        }
        if !decision.reasoning.is_empty() {
            question.push_str(&format!(" ({})", decision.reasoning));
        }

        tokio::task::spawn_blocking(move || ask_verdict(&question))
            .await
            .unwrap_or(GateVerdict::Reject)
    }
}

/// Empty answers count as yes
fn yes_by_default(answer: &str) -> bool {
    !matches!(answer.trim().to_ascii_lowercase().as_str(), "n" | "no")
}

/// Fill in what `--interactive` asks for
fn prompt_run_args(mut args: RunArgs, default_steps: u32) -> Result<RunArgs> {
    println!("◆ Interactive run");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if args.task.is_none() {
        let task = prompt("Task: ")?;
        if !task.is_empty() {
            args.task = Some(task);
        }
    }

    if args.app.is_none() {
        let app = prompt("Starting application (empty for current screen): ")?;
        if !app.is_empty() {
            args.app = Some(app);
        }
    }

    if args.max_steps.is_none() {
        let answer = prompt(&format!("Step budget [{}]: ", default_steps))?;
        if !answer.is_empty() {
            let steps = answer
                .parse::<usize>()
                .with_context(|| format!("not a step count: {}", answer))?;
            args.max_steps = Some(steps);
        }
    }

    if !args.plan {
        args.plan = prompt("Survey and plan first? (y/N): ")?.eq_ignore_ascii_case("y");
    }

    if !args.confirm {
        args.confirm = yes_by_default(&prompt("Confirm each activate/type? (Y/n): ")?);
    }

    println!();
    Ok(args)
}

/// Where `--report` should land: a directory gets a generated file name
fn report_file(target: &Path, report: &TaskReport) -> PathBuf {
    if target.is_dir() {
        let stem: String = safe_filename(&report.task).chars().take(48).collect();
        let id = report.run_id.simple().to_string();
        target.join(format!("{}-{}.json", stem, &id[..8]))
    } else {
        target.to_path_buf()
    }
}

async fn write_report(target: &Path, report: &TaskReport) -> Result<PathBuf> {
    let path = report_file(target, report);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let json = report.to_json_pretty()?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("writing report to {}", path.display()))?;
    Ok(path)
}

/// Run a navigation task
pub async fn run_command(args: RunArgs) -> Result<()> {
    let config = Config::load().await?;

    let args = if args.interactive {
        prompt_run_args(args, config.navigator.max_steps)?
    } else {
        args
    };

    let task = match args.task.as_deref().map(str::trim) {
        Some(task) if !task.is_empty() => task.to_string(),
        _ => bail!("No task given. Pass --task or use --interactive"),
    };

    config.validate()?;

    let api_key = config.api_key().context("No API key configured")?;
    let provider = OpenRouterProvider::new(api_key, config.api_base(), Some(config.model()));
    let oracle = LlmOracle::from_config(provider, &config.navigator);

    let reader = Arc::new(HttpScreenReader::with_timeout(
        &config.screen_reader.base_url,
        config.screen_reader.timeout(),
    ));

    if let Some(app) = &args.app {
        match reader.open_app(app).await {
            Ok(()) => {
                info!("◆ Opened {}", app);
                tokio::time::sleep(config.navigator.settle_delay()).await;
            }
            Err(e) => warn!("◆ Could not open {}: {}; starting from current screen", app, e),
        }
    }

    for key in &args.keys {
        if let Err(e) = reader.press_key(key).await {
            warn!("◆ Could not press {}: {}", key, e);
        }
    }

    let gate: Arc<dyn ActionGate> = if args.confirm {
        Arc::new(TerminalGate)
    } else {
        Arc::new(AutoApprove)
    };

    let mut request = TaskRequest::new(&task).with_mode(if args.plan {
        RunMode::PlanThenExecute
    } else {
        RunMode::Direct
    });
    if let Some(steps) = args.max_steps {
        request = request.with_max_steps(steps);
    }

    let mut session = ReaderSession::new(reader);
    let report = TaskRunner::new(config.navigator.clone())
        .with_gate(gate)
        .run(&mut session, &oracle, &request)
        .await?;

    println!("{}", report.render());

    if let Some(target) = &args.report {
        let path = write_report(target, &report).await?;
        println!("◆ Report written to {}", path.display());
    }

    Ok(())
}

/// Check the façade
pub async fn probe_command() -> Result<()> {
    let config = Config::load().await?;
    let reader = HttpScreenReader::with_timeout(
        &config.screen_reader.base_url,
        config.screen_reader.timeout(),
    );

    println!("◆ Probing {}", reader.base_url());
    let health = reader
        .health()
        .await
        .with_context(|| format!("façade at {} is not reachable", reader.base_url()))?;

    println!(
        "Façade:        {}",
        health.status.as_deref().unwrap_or("ok")
    );
    println!(
        "Screen reader: {}",
        if health.voice_over_running {
            "[Running]"
        } else {
            "[Stopped]"
        }
    );
    Ok(())
}

/// Show status
pub async fn status_command() -> Result<()> {
    let config_path = srnav_config::config_path();
    let reports = srnav_config::reports_dir();

    println!("◆ srnav Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_path.exists() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );
    println!(
        "Reports:   {} {}",
        reports.display(),
        if reports.exists() { "[OK]" } else { "[Missing]" }
    );

    if config_path.exists() {
        let config = Config::load().await?;
        println!("Model:     {}", config.model());
        println!(
            "API Key:   {}",
            if config.has_api_key() {
                "[Set]"
            } else {
                "[Missing]"
            }
        );
        println!("Façade:    {}", config.screen_reader.base_url);
        println!("Max steps: {}", config.navigator.max_steps);
        println!("Settle:    {} ms", config.navigator.settle_delay_ms);
    }

    println!("\n◆ Ready");
    Ok(())
}

/// Initialize config
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing srnav...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = srnav_config::init().await?;

    println!("Config:  {}", srnav_config::config_path().display());
    println!("Reports: {}", srnav_config::reports_dir().display());
    println!("\n◆ srnav initialized");
    println!("\nNext steps:");
    if !config.has_api_key() {
        println!("  1. Add your API key to ~/.srnav/config.json (or run: srnav setup)");
        println!("     Get one at: https://openrouter.ai/keys");
    }
    println!(
        "  - Start the screen-reader façade at {}, then: srnav probe",
        config.screen_reader.base_url
    );
    println!("  - Navigate: srnav run -t \"what is the weather in Seattle\"");

    Ok(())
}

/// OpenRouter model response
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    id: String,
    name: Option<String>,
}

/// Model families that follow the JSON reply contract well
const TARGET_MODELS: &[&str] = &["claude", "gpt", "gemini"];

async fn fetch_openrouter_models(api_key: &str) -> Result<Vec<ModelInfo>> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/models", OPENROUTER_API_BASE))
        .header("Authorization", format!("Bearer {}", api_key))
        .send()
        .await?;

    if !response.status().is_success() {
        bail!("Failed to fetch models: {}", response.status());
    }

    let models: ModelsResponse = response.json().await?;
    Ok(models.data)
}

fn filter_models(models: Vec<ModelInfo>) -> Vec<ModelInfo> {
    models
        .into_iter()
        .filter(|m| {
            let id = m.id.to_lowercase();
            TARGET_MODELS.iter().any(|target| id.contains(target))
        })
        .collect()
}

async fn choose_model(api_key: &str) -> Result<String> {
    print!("Fetching available models... ");
    std::io::stdout().flush()?;

    let models = match fetch_openrouter_models(api_key).await {
        Ok(models) => filter_models(models),
        Err(e) => {
            println!("✗ {}", e);
            println!("Using default model.");
            return Ok(DEFAULT_MODEL.to_string());
        }
    };
    println!("✓ Found {} models", models.len());
    println!();

    for (i, model) in models.iter().take(10).enumerate() {
        let name = model.name.as_ref().unwrap_or(&model.id);
        println!("  {}. {} ({})", i + 1, name, model.id);
    }
    println!();
    println!("  m. Enter model ID manually");
    println!("  d. Use default ({})", DEFAULT_MODEL);

    let choice = prompt("Your choice: ")?;
    let model = match choice.as_str() {
        "m" | "M" => prompt("Model ID: ")?,
        "d" | "D" | "" => DEFAULT_MODEL.to_string(),
        num => match num.parse::<usize>() {
            Ok(idx) if idx > 0 && idx <= models.len().min(10) => models[idx - 1].id.clone(),
            _ => {
                println!("Invalid selection, using default.");
                DEFAULT_MODEL.to_string()
            }
        },
    };
    Ok(model)
}

/// Interactive setup wizard
pub async fn setup_command() -> Result<()> {
    println!("◆ srnav Setup Wizard");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    println!("Step 1: OpenRouter API Key");
    println!("Get your API key at: https://openrouter.ai/keys");
    println!();

    let api_key = loop {
        print!("Enter your OpenRouter API key: ");
        std::io::stdout().flush()?;
        let key = read_password();
        if key.is_empty() {
            println!("API key cannot be empty. Please try again.");
            continue;
        }

        print!("Validating API key... ");
        std::io::stdout().flush()?;
        if fetch_openrouter_models(&key).await.is_ok() {
            println!("✓ Valid!");
            break key;
        }

        println!("✗ Invalid");
        let answer = prompt("Try again? (Y/n/skip): ")?.to_lowercase();
        match answer.as_str() {
            "skip" | "s" => break key,
            "n" | "no" => bail!("Setup cancelled"),
            _ => {}
        }
    };
    println!();

    println!("Step 2: Select Model");
    let model = choose_model(&api_key).await?;
    println!();

    println!("Step 3: Screen-Reader Façade");
    let config_path = srnav_config::config_path();
    let mut config = Config::load().await.unwrap_or_default();

    let base_url = prompt(&format!(
        "Façade URL [{}]: ",
        config.screen_reader.base_url
    ))?;
    if !base_url.is_empty() {
        config.screen_reader.base_url = base_url;
    }

    let steps = prompt(&format!("Step budget [{}]: ", config.navigator.max_steps))?;
    if !steps.is_empty() {
        match steps.parse::<u32>() {
            Ok(n) if n > 0 => config.navigator.max_steps = n,
            _ => println!("Invalid budget, keeping {}.", config.navigator.max_steps),
        }
    }
    println!();

    println!("Step 4: Saving Configuration");
    config.providers.openrouter = ProviderConfig {
        api_key,
        api_base: Some(OPENROUTER_API_BASE.to_string()),
    };
    config.navigator.model = model;
    config.save().await?;
    tokio::fs::create_dir_all(srnav_config::reports_dir()).await?;
    println!("✓ Saved to {}", config_path.display());
    println!();

    println!("Setup complete! ✓");
    println!();
    println!("Next steps:");
    println!("  - Check the façade:  srnav probe");
    println!("  - Navigate:          srnav run -t \"what is the weather in Seattle\"");
    println!("  - Check status:      srnav status");

    Ok(())
}
