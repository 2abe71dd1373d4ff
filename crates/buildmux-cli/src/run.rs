//! Orchestration glue: parse CLI arguments, assemble the caches and engine,
//! submit one top-level request, and render the result.

use std::sync::Arc;

use buildmux_config_cache::ConfigCache;
use buildmux_core::config::BuildRequestConfiguration;
use buildmux_core::names::GlobalProperties;
use buildmux_core::request::{BuildRequest, BuildRequestFlags};
use buildmux_engine::engine::RequestEngine;
use buildmux_events::telemetry::TelemetryService;
use buildmux_results_cache::ResultsCache;

use crate::cli::{Cli, Command};
use crate::config::BuildmuxConfig;
use crate::demo_target_builder::DemoTargetBuilder;
use crate::exit::{EXIT_OK, exit_code_for};

const CENTRAL_NODE: u32 = 0;

/// Parse a `name=value` global property argument.
fn parse_property(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("invalid -p/--property value {raw:?}, expected NAME=VALUE"))
}

/// Run the parsed CLI, returning the process exit code.
pub async fn run(cli: Cli) -> i32 {
    let cwd = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    let config = match BuildmuxConfig::load(cli.config.as_deref(), &cwd) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return crate::exit::EXIT_INTERNAL_ERROR;
        }
    };

    let telemetry = TelemetryService::new();
    telemetry.initialize(false);

    match cli.command {
        Command::Config => {
            print_config(&config, cli.json);
            EXIT_OK
        }
        Command::Build {
            project,
            targets,
            properties,
            tools_version,
            max_cpu_count,
            provide_project_state,
        } => run_build(&config, project, targets, properties, tools_version, max_cpu_count, provide_project_state, cli.json, &cwd).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_build(
    config: &BuildmuxConfig,
    project: std::path::PathBuf,
    targets: Vec<String>,
    properties: Vec<String>,
    tools_version: String,
    max_cpu_count: Option<usize>,
    provide_project_state: bool,
    json: bool,
    cwd: &std::path::Path,
) -> i32 {
    let mut global_properties = GlobalProperties::new();
    for raw in &properties {
        match parse_property(raw) {
            Ok((name, value)) => global_properties.insert(name, value),
            Err(message) => {
                eprintln!("error: {message}");
                return crate::exit::EXIT_INTERNAL_ERROR;
            }
        }
    }

    let project_full_path = if project.is_absolute() { project } else { cwd.join(project) };
    let build_config =
        BuildRequestConfiguration::new(project_full_path.display().to_string(), global_properties, tools_version);

    let config_cache = Arc::new(ConfigCache::new());
    let results_cache = Arc::new(ResultsCache::new());
    let configuration_id = config_cache.intern(build_config);

    let engine = Arc::new(RequestEngine::new(
        Arc::clone(&config_cache),
        Arc::clone(&results_cache),
        Arc::new(DemoTargetBuilder),
    ));
    engine.register_node(CENTRAL_NODE, max_cpu_count.unwrap_or_else(|| config.max_cpu_count()));

    let mut flags = BuildRequestFlags::empty();
    if provide_project_state {
        flags |= BuildRequestFlags::PROVIDE_PROJECT_STATE_AFTER_BUILD;
    }
    let mut request = BuildRequest::new_top_level(0, 0, configuration_id, targets);
    request.flags = flags;

    let global_request_id = match RequestEngine::submit(&engine, request).await {
        Ok(id) => id,
        Err(err) => {
            report_engine_error(err);
            return crate::exit::EXIT_INTERNAL_ERROR;
        }
    };

    let result = match engine.await_result(global_request_id).await {
        Ok(result) => result,
        Err(err) => {
            report_engine_error(err);
            return crate::exit::EXIT_INTERNAL_ERROR;
        }
    };

    if let Err(err) = results_cache.add(result.clone()) {
        eprintln!("{:?}", miette::Report::new(err));
        return crate::exit::EXIT_INTERNAL_ERROR;
    }

    print_result(&result, json);
    exit_code_for(&result)
}

/// Render an engine failure as a `miette` diagnostic report. Every error
/// type in the engine/cache stack derives `miette::Diagnostic`, so failures
/// get the same rich rendering the teacher's CLI gives `CliError`.
fn report_engine_error(err: buildmux_engine::Error) {
    eprintln!("{:?}", miette::Report::new(err));
}

fn print_config(config: &BuildmuxConfig, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "temp_root": config.temp_root(),
                "max_cpu_count": config.max_cpu_count(),
                "disable_in_proc_node": config.disable_in_proc_node(),
                "multithreaded": config.multithreaded(),
            })
        );
    } else {
        println!("temp_root: {}", config.temp_root().display());
        println!("max_cpu_count: {}", config.max_cpu_count());
        println!("disable_in_proc_node: {}", config.disable_in_proc_node());
        println!("multithreaded: {}", config.multithreaded());
    }
}

fn print_result(result: &buildmux_core::result::BuildResult, json: bool) {
    if json {
        match serde_json::to_string(result) {
            Ok(text) => println!("{text}"),
            Err(err) => eprintln!("error: failed to serialize result: {err}"),
        }
        return;
    }

    for (name, target) in &result.results_by_target {
        println!("{name}: {:?}", target.work_unit_result.result_code);
        if let Some(exception) = &target.work_unit_result.exception {
            println!("  exception: {exception}");
        }
    }
    println!("overall: {:?}", result.overall_result());
}
