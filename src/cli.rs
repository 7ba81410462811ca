use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::PathBuf;

use crate::handler::User;

/// rest-swagger - Generate Swagger 2.0 documents from declared REST handlers
#[derive(Parser, Debug)]
#[command(name = "rest-swagger")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Manifest file, or a directory searched for manifests
    #[arg(value_name = "MANIFEST_PATH")]
    pub manifest_path: PathBuf,

    /// Settings file with global and per-document sections
    #[arg(short = 's', long = "settings", value_name = "FILE")]
    pub settings_path: Option<PathBuf>,

    /// Document variant to build
    #[arg(short = 'c', long = "config", value_name = "NAME", default_value = "default")]
    pub config_name: String,

    /// Output format (json or yaml)
    #[arg(short = 'f', long = "format", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Caller the document is generated for
    #[arg(short = 'u', long = "user", value_enum, default_value = "anonymous")]
    pub user: UserRole,

    /// API version substituted into the base path
    #[arg(long = "api-version", value_name = "VERSION")]
    pub api_version: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UserRole {
    Anonymous,
    Authenticated,
    Superuser,
}

impl From<UserRole> for User {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Anonymous => User::anonymous(),
            UserRole::Authenticated => User::authenticated(),
            UserRole::Superuser => User::superuser(),
        }
    }
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.manifest_path.exists() {
        anyhow::bail!("Manifest path does not exist: {}", args.manifest_path.display());
    }
    if let Some(settings) = &args.settings_path {
        if !settings.is_file() {
            anyhow::bail!("Settings file does not exist: {}", settings.display());
        }
    }

    info!("Manifest path: {}", args.manifest_path.display());
    info!("Document: {} as {:?}", args.config_name, args.user);
    info!("Output format: {:?}", args.output_format);
    match &args.output_path {
        Some(output) => info!("Output file: {}", output.display()),
        None => info!("Output: stdout"),
    }

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    use crate::config::SwaggerSettings;
    use crate::manifest::Manifest;
    use crate::scanner::ManifestScanner;
    use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
    use crate::views::{DocumentRequest, SwaggerJsonView};

    info!("Starting Swagger document generation...");

    // Step 1: Find manifests
    let manifest_files = if args.manifest_path.is_dir() {
        info!("Scanning manifest directory...");
        let scan_result = ManifestScanner::new(args.manifest_path.clone()).scan()?;
        for warning in &scan_result.warnings {
            warn!("{}", warning);
        }
        scan_result.manifest_files
    } else {
        vec![args.manifest_path.clone()]
    };
    info!("Found {} manifest files", manifest_files.len());
    if manifest_files.is_empty() {
        anyhow::bail!("No manifest files found in {}", args.manifest_path.display());
    }

    // Step 2: Load registrations
    let (manifest, errors) = Manifest::load_files(&manifest_files);
    if errors.len() == manifest_files.len() {
        anyhow::bail!("None of the {} manifest files could be loaded", manifest_files.len());
    }
    let (registry, routes) = manifest.into_parts();
    info!("Registered {} DTOs and {} top-level routes", registry.len(), routes.len());

    // Step 3: Load settings
    let settings = match &args.settings_path {
        Some(path) => SwaggerSettings::from_file(path)
            .with_context(|| format!("Failed to load settings: {}", path.display()))?,
        None => SwaggerSettings::single(Default::default()),
    };

    // Step 4: Build the document through the view
    let mut request = DocumentRequest::new(args.user.into()).with_config_name(&args.config_name);
    request.version = args.api_version.clone();
    let document = SwaggerJsonView::new(&settings, &registry, &routes)
        .get(&request)
        .with_context(|| format!("Failed to build document {}", args.config_name))?;
    info!(
        "Document built: {} paths, {} definitions",
        document.paths.len(),
        document.definitions.len()
    );

    // Step 5: Serialize and output
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&document)?,
        OutputFormat::Json => serialize_json(&document)?,
    };

    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
    } else {
        println!("{}", content);
    }

    info!("Generation complete!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
routes:
  - pattern: '^ping$'
    handler:
      name: PingView
      module: ops.views
      kind: plain
      methods: [GET]
      doc: "Health check.\n---\noperationId: ping"
"#;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["rest-swagger", "api.yaml"]).unwrap();
        assert_eq!(args.config_name, "default");
        assert_eq!(args.output_format, OutputFormat::Json);
        assert_eq!(args.user, UserRole::Anonymous);
        assert!(args.settings_path.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_all_flags() {
        let args = CliArgs::try_parse_from([
            "rest-swagger",
            "manifests/",
            "--settings",
            "settings.yaml",
            "--config",
            "admin",
            "-f",
            "yaml",
            "-o",
            "out/swagger.yaml",
            "--user",
            "superuser",
            "--api-version",
            "v2",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.config_name, "admin");
        assert_eq!(args.output_format, OutputFormat::Yaml);
        assert_eq!(User::from(args.user), User::superuser());
        assert_eq!(args.api_version.as_deref(), Some("v2"));
        assert!(args.verbose);
    }

    #[test]
    fn test_missing_manifest_path_is_rejected() {
        let args = CliArgs::try_parse_from(["rest-swagger", "/nonexistent/api.yaml"]).unwrap();
        assert!(parse_args_from_parsed(args).is_err());
    }

    #[test]
    fn test_run_writes_document() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("api.yaml");
        fs::write(&manifest, MANIFEST).unwrap();
        let output = dir.path().join("out/swagger.json");

        let args = CliArgs::try_parse_from([
            "rest-swagger",
            manifest.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .unwrap();
        run(args).unwrap();

        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["paths"]["/ping"]["get"]["operationId"], "ping");
    }

    #[test]
    fn test_run_unknown_config_fails() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("api.yaml");
        fs::write(&manifest, MANIFEST).unwrap();

        let args = CliArgs::try_parse_from(["rest-swagger", manifest.to_str().unwrap(), "-c", "admin"]).unwrap();
        let err = run(args).unwrap_err();
        assert!(format!("{:#}", err).contains("admin swagger settings not defined"));
    }
}
