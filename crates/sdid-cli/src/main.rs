//! SDID CLI: `sdid` command.
//!
//! A terminal identity agent and relying-party tool over the file-backed
//! stores: provision identities, answer login requests, inspect and revoke
//! origin grants, verify responses, and run administrator certification.

use std::io::{BufRead, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};

use sdid::authorization::{grants_for, revoke};
use sdid::certification::CertificationRegistry;
use sdid::identity::parse_list;
use sdid::protocol::{AutoConsent, ConsentCancelled};
use sdid::storage::{
    clear_identities, delete_identity, export_identities, import_identities, upsert_identity,
};
use sdid::{
    authorize, verify_login, AuthenticationEngine, ConsentCollaborator, ConsentDecision,
    ConsentRequest, FileStore, Identity, IdentityStore, LoginRequest, LoginResponse,
    P256Verifier, TrustPolicy,
};

// ── Directory helpers ─────────────────────────────────────────────────────────

/// `--home`, else `$SDID_HOME`, else `~/.sdid`.
fn sdid_home(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path);
    }
    if let Some(path) = std::env::var_os("SDID_HOME") {
        return Ok(PathBuf::from(path));
    }
    let home = std::env::var_os("HOME").ok_or_else(|| anyhow!("HOME is not set; pass --home"))?;
    Ok(PathBuf::from(home).join(".sdid"))
}

fn open_store(home: &std::path::Path) -> Result<FileStore> {
    FileStore::new(home).with_context(|| format!("failed to open store at {}", home.display()))
}

/// Find an identity by id, label, or DID.
fn find_identity(store: &FileStore, key: &str) -> Result<Identity> {
    store
        .load_identities()
        .context("failed to load identities")?
        .into_iter()
        .find(|i| i.id.as_str() == key || i.label == key || i.did_str() == key)
        .ok_or_else(|| anyhow!("identity '{key}' not found"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output")?
    );
    Ok(())
}

// ── Terminal consent ──────────────────────────────────────────────────────────

/// Asks on the terminal which identity to use and whether to remember the origin.
struct TerminalConsent;

impl TerminalConsent {
    fn read_line() -> std::io::Result<String> {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    fn prompt(request: &ConsentRequest) -> std::io::Result<Option<ConsentDecision>> {
        let mut err = std::io::stderr().lock();
        writeln!(
            err,
            "Login request from {}",
            request.origin.as_deref().unwrap_or("(unknown origin)")
        )?;
        if let Some(message) = &request.message {
            writeln!(err, "  \"{message}\"")?;
        }
        let mut default = 0;
        for (i, candidate) in request.candidates.iter().enumerate() {
            let preferred = request.preferred_id.as_ref() == Some(&candidate.id);
            if preferred {
                default = i;
            }
            writeln!(
                err,
                "  [{}] {} {}{}{}",
                i + 1,
                candidate.label,
                candidate.did,
                if candidate.authorized { " (authorized)" } else { "" },
                if preferred { " *" } else { "" }
            )?;
        }
        write!(err, "Select identity [{}], or 'c' to cancel: ", default + 1)?;
        err.flush()?;

        let choice = Self::read_line()?;
        if choice.eq_ignore_ascii_case("c") {
            return Ok(None);
        }
        let index = if choice.is_empty() {
            default
        } else {
            match choice.parse::<usize>() {
                Ok(n) if (1..=request.candidates.len()).contains(&n) => n - 1,
                _ => return Ok(None),
            }
        };

        write!(err, "Remember this origin? [y/n/Enter to keep]: ")?;
        err.flush()?;
        let remember = match Self::read_line()?.to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(true),
            "n" | "no" => Some(false),
            _ => None,
        };

        Ok(Some(ConsentDecision {
            identity_id: request.candidates[index].id.clone(),
            remember,
        }))
    }
}

#[async_trait]
impl ConsentCollaborator for TerminalConsent {
    async fn present(&self, request: ConsentRequest) -> std::result::Result<ConsentDecision, ConsentCancelled> {
        match tokio::task::spawn_blocking(move || TerminalConsent::prompt(&request)).await {
            Ok(Ok(Some(decision))) => Ok(decision),
            Ok(Ok(None)) => Err(ConsentCancelled),
            Ok(Err(e)) => {
                log::warn!("consent prompt failed: {e}");
                Err(ConsentCancelled)
            }
            Err(e) => {
                log::warn!("consent prompt task failed: {e}");
                Err(ConsentCancelled)
            }
        }
    }
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// SDID CLI: self-custodied DID login agent and verifier.
#[derive(Parser, Debug)]
#[command(
    name = "sdid",
    about = "SDID CLI",
    version,
    long_about = "sdid: self-custodied DID login\n\nProvision, export and import P-256 did:key identities, answer login\nchallenges, manage remembered origins, verify responses, and certify identities."
)]
struct Cli {
    /// Store directory (default: $SDID_HOME or ~/.sdid)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new identity
    Init {
        /// Display label
        #[arg(long)]
        label: String,

        /// Comma-separated roles (e.g. "admin,ops")
        #[arg(long)]
        roles: Option<String>,

        /// Domain this identity is used for
        #[arg(long)]
        domain: Option<String>,

        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// List all identities
    List,

    /// Display one identity's public descriptor
    Show {
        /// Identity id, label or DID
        identity: String,
    },

    /// Delete an identity and its key material
    Delete {
        /// Identity id, label or DID
        identity: String,
    },

    /// Delete every identity
    Clear {
        /// Confirm deletion
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Export identities, including private keys, as a versioned bundle
    Export {
        /// Output file (stdout when omitted)
        file: Option<PathBuf>,
    },

    /// Import identities from a bundle or array (file, or '-' for stdin)
    Import {
        /// Bundle file
        file: PathBuf,
    },

    /// List remembered origins
    Grants,

    /// Forget a remembered origin
    Revoke {
        /// Identity id, label or DID
        identity: String,

        /// Origin to forget
        origin: String,
    },

    /// Answer a login request
    Login {
        /// Requesting origin
        #[arg(long)]
        origin: Option<String>,

        /// Request a specific identity
        #[arg(long)]
        identity: Option<String>,

        /// Challenge to sign (generated when omitted)
        #[arg(long)]
        challenge: Option<String>,

        /// Statement shown to the user
        #[arg(long)]
        message: Option<String>,

        /// Always prompt, even for remembered origins
        #[arg(long)]
        force_prompt: bool,

        /// Approve without prompting
        #[arg(long, short = 'y')]
        yes: bool,

        /// With --yes: remember (true) or forget (false) the origin
        #[arg(long)]
        remember: Option<bool>,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Verify a login response (JSON file, or '-' for stdin)
    Verify {
        /// Response file
        response: PathBuf,

        /// Which certification states to trust
        #[arg(long, value_enum, default_value = "certified")]
        policy: PolicyArg,
    },

    /// Administrator certification
    Certify {
        #[command(subcommand)]
        subcommand: CertifyCommands,
    },
}

#[derive(Subcommand, Debug)]
enum CertifyCommands {
    /// Ask an admin to certify an identity
    Submit {
        /// Identity id, label or DID
        identity: String,
    },

    /// Show an identity's certification state
    Status {
        /// Identity id, label or DID
        identity: String,
    },

    /// List approval requests
    List {
        /// Only pending requests
        #[arg(long)]
        pending: bool,
    },

    /// Approve a pending request by signing with an admin identity
    Approve {
        /// Approval request id
        request_id: String,

        /// Admin identity to sign with
        #[arg(long)]
        admin: Option<String>,

        /// Approve without prompting
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Certified,
    AdminOnly,
}

impl From<PolicyArg> for TrustPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Certified => TrustPolicy::Certified,
            PolicyArg::AdminOnly => TrustPolicy::AdminOnly,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if verbose { "debug" } else { "warn" }),
    )
    .init();

    let result = match sdid_home(cli.home) {
        Ok(home) => run(cli.command, home, verbose).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, home: PathBuf, verbose: bool) -> Result<()> {
    let store = open_store(&home)?;
    match command {
        Commands::Init {
            label,
            roles,
            domain,
            tags,
            notes,
        } => cmd_init(&store, label, roles, domain, tags, notes, verbose),
        Commands::List => cmd_list(&store),
        Commands::Show { identity } => cmd_show(&store, &identity),
        Commands::Delete { identity } => cmd_delete(&store, &identity),
        Commands::Clear { yes } => cmd_clear(&store, yes),
        Commands::Export { file } => cmd_export(&store, file.as_deref()),
        Commands::Import { file } => cmd_import(&store, &file),
        Commands::Grants => cmd_grants(&store),
        Commands::Revoke { identity, origin } => cmd_revoke(&store, &identity, &origin),
        Commands::Login {
            origin,
            identity,
            challenge,
            message,
            force_prompt,
            yes,
            remember,
            timeout,
        } => {
            let identity_id = match identity {
                Some(key) => Some(find_identity(&store, &key)?.id),
                None => None,
            };
            let request = LoginRequest {
                request_id: Some(sdid::PendingRequests::new_request_id()),
                message,
                identity_id,
                challenge,
                force_prompt,
            };
            cmd_login(store, origin.as_deref(), request, yes, remember, timeout).await
        }
        Commands::Verify { response, policy } => cmd_verify(&store, &response, policy.into()),
        Commands::Certify { subcommand } => match subcommand {
            CertifyCommands::Submit { identity } => cmd_certify_submit(&store, &identity),
            CertifyCommands::Status { identity } => cmd_certify_status(&store, &identity),
            CertifyCommands::List { pending } => cmd_certify_list(&store, pending),
            CertifyCommands::Approve {
                request_id,
                admin,
                yes,
            } => cmd_certify_approve(store, &request_id, admin.as_deref(), yes).await,
        },
    }
}

// ── Identity commands ─────────────────────────────────────────────────────────

/// `sdid init --label LABEL [--roles R] [--domain D] [--tags T] [--notes N]`
fn cmd_init(
    store: &FileStore,
    label: String,
    roles: Option<String>,
    domain: Option<String>,
    tags: Option<String>,
    notes: Option<String>,
    verbose: bool,
) -> Result<()> {
    if label.trim().is_empty() {
        bail!("label cannot be empty");
    }
    if store
        .load_identities()
        .context("failed to load identities")?
        .iter()
        .any(|i| i.label == label)
    {
        bail!("an identity labelled '{label}' already exists");
    }

    let mut identity = Identity::generate(label.trim(), roles.as_deref().map(parse_list).unwrap_or_default());
    identity.domain = domain.unwrap_or_default();
    identity.tags = tags.as_deref().map(parse_list).unwrap_or_default();
    identity.notes = notes.unwrap_or_default();

    upsert_identity(store, identity.clone()).context("failed to save identity")?;

    println!("Created identity '{}'", identity.label);
    println!("  ID:    {}", identity.id);
    println!("  DID:   {}", identity.did_str());
    if !identity.roles.is_empty() {
        println!("  Roles: {}", identity.roles.join(", "));
    }
    if verbose {
        println!("  Store: {}", store.base_dir().display());
    }
    Ok(())
}

/// `sdid list`
fn cmd_list(store: &FileStore) -> Result<()> {
    let identities = store.load_identities().context("failed to load identities")?;
    if identities.is_empty() {
        println!("No identities found in {}", store.base_dir().display());
        return Ok(());
    }

    let last_used = store.last_used().ok().flatten();
    println!("{:<2} {:<16} {:<12} {:<10} DID", "", "LABEL", "ROLES", "ELIGIBLE");
    println!("{}", "-".repeat(96));
    for identity in &identities {
        println!(
            "{:<2} {:<16} {:<12} {:<10} {}",
            if last_used.as_ref() == Some(&identity.id) { "*" } else { "" },
            identity.display_label(),
            identity.roles.join(","),
            if identity.is_eligible() { "yes" } else { "no" },
            identity.did_str()
        );
    }
    Ok(())
}

/// `sdid show IDENTITY`
fn cmd_show(store: &FileStore, key: &str) -> Result<()> {
    let identity = find_identity(store, key)?;
    print_json(&identity.descriptor(None, &sdid::EngineConfig::default().key_fragment))
}

/// `sdid delete IDENTITY`
fn cmd_delete(store: &FileStore, key: &str) -> Result<()> {
    let identity = find_identity(store, key)?;
    delete_identity(store, &identity.id).context("failed to delete identity")?;
    println!("Deleted identity '{}' ({})", identity.display_label(), identity.id);
    Ok(())
}

/// `sdid clear --yes`
fn cmd_clear(store: &FileStore, yes: bool) -> Result<()> {
    if !yes {
        bail!("refusing to delete every identity without --yes");
    }
    let count = clear_identities(store).context("failed to clear identities")?;
    println!("Deleted {count} identities");
    Ok(())
}

/// `sdid export [FILE]`
fn cmd_export(store: &FileStore, file: Option<&std::path::Path>) -> Result<()> {
    let bundle = export_identities(store).context("failed to load identities")?;
    if bundle.identities.is_empty() {
        bail!("no identities to export");
    }
    let json = serde_json::to_string_pretty(&bundle).context("failed to serialize bundle")?;
    match file {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "Exported {} identities to {} (contains private keys)",
                bundle.identities.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// `sdid import FILE`
fn cmd_import(store: &FileStore, path: &std::path::Path) -> Result<()> {
    let raw = read_input(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw).context("bundle must be JSON")?;
    let summary = import_identities(store, &value).context("import failed")?;
    println!(
        "Imported identities: {} added, {} replaced, {} skipped",
        summary.added, summary.replaced, summary.skipped
    );
    Ok(())
}

/// Read a file, or stdin for `-`.
fn read_input(path: &std::path::Path) -> Result<String> {
    let mut raw = String::new();
    if path.as_os_str() == "-" {
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read stdin")?;
    } else {
        raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
    }
    Ok(raw)
}

/// `sdid grants`
fn cmd_grants(store: &FileStore) -> Result<()> {
    let grants = grants_for(store).context("failed to load grants")?;
    if grants.is_empty() {
        println!("No remembered origins");
        return Ok(());
    }
    println!("{:<40} {:<36} LAST USED", "ORIGIN", "IDENTITY");
    println!("{}", "-".repeat(100));
    for (id, grant) in grants {
        println!(
            "{:<40} {:<36} {}",
            grant.origin,
            id,
            sdid::time::to_rfc3339(grant.last_used_at)
        );
    }
    Ok(())
}

/// `sdid revoke IDENTITY ORIGIN`
fn cmd_revoke(store: &FileStore, key: &str, origin: &str) -> Result<()> {
    let identity = find_identity(store, key)?;
    if sdid::authorization::grant_for(&identity, origin).is_none() {
        bail!("'{}' has no grant for {origin}", identity.display_label());
    }
    revoke(store, &identity.id, origin).context("failed to revoke origin")?;
    println!("Revoked {origin} for '{}'", identity.display_label());
    Ok(())
}

// ── Protocol commands ─────────────────────────────────────────────────────────

async fn respond<C: ConsentCollaborator>(
    store: FileStore,
    consent: C,
    origin: Option<&str>,
    request: LoginRequest,
    timeout: Option<u64>,
) -> LoginResponse {
    let engine = AuthenticationEngine::new(Arc::new(store), Arc::new(consent));
    match timeout {
        Some(secs) => {
            engine
                .handle_with_timeout(origin, request, Duration::from_secs(secs))
                .await
        }
        None => engine.handle(origin, request).await,
    }
}

/// `sdid login [--origin O] [--identity I] [--challenge C] [--yes] ...`
async fn cmd_login(
    store: FileStore,
    origin: Option<&str>,
    request: LoginRequest,
    yes: bool,
    remember: Option<bool>,
    timeout: Option<u64>,
) -> Result<()> {
    let response = if yes {
        respond(store, AutoConsent { remember }, origin, request, timeout).await
    } else {
        respond(store, TerminalConsent, origin, request, timeout).await
    };
    print_json(&response)?;
    if let LoginResponse::Failure(failure) = &response {
        bail!("{}: {}", failure.error, failure.message);
    }
    Ok(())
}

/// `sdid verify RESPONSE [--policy P]`
fn cmd_verify(store: &FileStore, path: &std::path::Path, policy: TrustPolicy) -> Result<()> {
    let raw = read_input(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw).context("response must be JSON")?;
    let response = LoginResponse::from_value(&value).context("not a login response")?;

    let login = match &response {
        LoginResponse::Success(login) => login,
        LoginResponse::Failure(failure) => {
            println!("Login failed: {} ({})", failure.error, failure.message);
            return Ok(());
        }
    };

    let outcome = verify_login(login, &P256Verifier);
    let registry = CertificationRegistry::new(Arc::new(open_store(store.base_dir())?));
    let status = registry
        .status(Some(&login.identity))
        .context("failed to load approval requests")?;
    let decision = authorize(&outcome, &status, policy);

    println!("Identity:      {} ({})", login.identity.label, login.identity.did);
    println!("Signature:     {} [{:?}]", outcome.reason, outcome.severity);
    println!("Certification: {}", decision.certification);
    if let Some(at) = decision.approved_at {
        println!("Approved at:   {}", sdid::time::to_rfc3339(at));
    }
    match decision.reason {
        None => println!("Authorized:    yes"),
        Some(reason) => println!("Authorized:    no ({reason:?})"),
    }
    Ok(())
}

// ── Certification commands ────────────────────────────────────────────────────

fn registry(store: &FileStore) -> Result<CertificationRegistry<FileStore>> {
    Ok(CertificationRegistry::new(Arc::new(open_store(store.base_dir())?)))
}

/// `sdid certify submit IDENTITY`
fn cmd_certify_submit(store: &FileStore, key: &str) -> Result<()> {
    let identity = find_identity(store, key)?;
    let request = registry(store)?
        .submit(Some(&identity.descriptor(None, "key-1")))
        .context("submission rejected")?;
    println!("Submitted approval request {}", request.id);
    println!("  Applicant: {} ({})", request.applicant_label, request.applicant_did);
    Ok(())
}

/// `sdid certify status IDENTITY`
fn cmd_certify_status(store: &FileStore, key: &str) -> Result<()> {
    let identity = find_identity(store, key)?;
    let status = registry(store)?
        .status(Some(&identity.descriptor(None, "key-1")))
        .context("failed to load approval requests")?;
    println!("{}: {}", identity.display_label(), status.state);
    if let Some(request) = &status.request {
        println!("  Request:  {}", request.id);
        println!("  Created:  {}", sdid::time::to_rfc3339(request.created_at));
        if let (Some(at), Some(by)) = (request.approved_at, &request.approver_did) {
            println!("  Approved: {} by {by}", sdid::time::to_rfc3339(at));
        }
    }
    Ok(())
}

/// `sdid certify list [--pending]`
fn cmd_certify_list(store: &FileStore, pending_only: bool) -> Result<()> {
    let registry = registry(store)?;
    let requests = if pending_only {
        registry.pending()
    } else {
        registry.list()
    }
    .context("failed to load approval requests")?;

    if requests.is_empty() {
        println!("No approval requests");
        return Ok(());
    }
    println!("{:<34} {:<9} {:<16} APPLICANT", "ID", "STATUS", "LABEL");
    println!("{}", "-".repeat(110));
    for request in requests {
        println!(
            "{:<34} {:<9} {:<16} {}",
            request.id,
            if request.is_approved() { "approved" } else { "pending" },
            request.applicant_label,
            request.applicant_did
        );
    }
    Ok(())
}

/// `sdid certify approve REQUEST_ID [--admin I] [--yes]`
async fn cmd_certify_approve(
    store: FileStore,
    request_id: &str,
    admin: Option<&str>,
    yes: bool,
) -> Result<()> {
    let registry = registry(&store)?;
    let mut request = registry
        .approval_login_request(request_id)
        .context("cannot approve")?;
    if let Some(key) = admin {
        let admin = find_identity(&store, key)?;
        if !admin.is_admin() {
            bail!("'{}' does not hold the admin role", admin.display_label());
        }
        request.identity_id = Some(admin.id);
    }

    let response = if yes {
        respond(store, AutoConsent::default(), None, request, None).await
    } else {
        respond(store, TerminalConsent, None, request, None).await
    };
    let approved = registry
        .complete_approval(request_id, &response, &P256Verifier)
        .context("approval rejected")?;

    println!("Approved {}", approved.id);
    println!("  Applicant: {} ({})", approved.applicant_label, approved.applicant_did);
    if let Some(by) = &approved.approver_did {
        println!("  Approver:  {by}");
    }
    Ok(())
}
