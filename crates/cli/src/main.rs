use clap::{Parser, Subcommand};
use ecm_api::ApiClient;
use ecm_core::catalog::{DEFAULT_INSTANCE_TYPE, DEFAULT_REGION};
use ecm_core::config::ConsoleConfig;
use ecm_core::error::ConsoleError;
use ecm_core::model::CreateInstanceParams;
use ecm_core::session::AuthSession;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod instance;
mod ls;
mod spinner;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "ecm")]
#[command(about = "ECM - Manage your cloud development instances from the terminal")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the session in ~/.ecm/session.json
    Login {
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Create an account and log in
    Register {
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List all instances
    Ls {
        #[arg(long)]
        json: bool,
    },
    /// Show one instance
    Show {
        /// The ID of the instance
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Launch a new instance
    Create {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = DEFAULT_INSTANCE_TYPE)]
        instance_type: String,
        #[arg(short, long, default_value = DEFAULT_REGION)]
        region: String,
        /// Do not allocate an elastic IP at launch
        #[arg(long)]
        no_elastic_ip: bool,
    },
    /// Start a stopped instance
    Start { id: String },
    /// Stop a running instance
    Stop { id: String },
    /// Terminate an instance. This cannot be undone
    Terminate {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Manage elastic IPs
    Eip {
        #[command(subcommand)]
        action: EipAction,
    },
    /// Follow the instance list, or one instance, until Ctrl-C
    Watch { id: Option<String> },
    /// List the instance types and regions that can be launched
    Types,
}

#[derive(Subcommand, Debug)]
enum EipAction {
    /// Bind a fresh elastic IP to a running instance
    Associate { id: String },
    /// Release the elastic IP bound to an instance
    Disassociate {
        id: String,
        /// The allocation expected to be bound; defaults to the current one
        #[arg(short, long)]
        allocation_id: Option<String>,
    },
}

/// Shared by every handler: the loaded config, the session and the client reading it.
pub struct Context {
    pub config: ConsoleConfig,
    pub session: Arc<AuthSession>,
    pub client: Arc<ApiClient>,
}

impl Context {
    fn init() -> CliResult<Context> {
        let config = config::load_config()?;
        let session = Arc::new(AuthSession::init()?);
        let client = Arc::new(ApiClient::new(config.api_url.clone(), Arc::clone(&session)));
        Ok(Context {
            config,
            session,
            client,
        })
    }

    fn require_login(&self) -> CliResult {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err("ログインしていません。`ecm login` でログインしてください。".into())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

impl Commands {
    fn needs_login(&self) -> bool {
        !matches!(
            self,
            Commands::Login { .. }
                | Commands::Register { .. }
                | Commands::Logout
                | Commands::Whoami
                | Commands::Types
        )
    }
}

async fn run(command: Commands) -> CliResult {
    if let Commands::Types = command {
        println!("{}", ls::types_table());
        println!("{}", ls::regions_table());
        return Ok(());
    }

    let ctx = Context::init()?;
    if command.needs_login() {
        ctx.require_login()?;
    }
    match command {
        Commands::Login { email } => auth::handle_login(&ctx, email).await,
        Commands::Register { username, email } => auth::handle_register(&ctx, username, email).await,
        Commands::Logout => auth::handle_logout(&ctx),
        Commands::Whoami => auth::handle_whoami(&ctx).await,
        Commands::Ls { json } => instance::handle_ls(&ctx, json).await,
        Commands::Show { id, json } => instance::handle_show(&ctx, id, json).await,
        Commands::Create {
            name,
            instance_type,
            region,
            no_elastic_ip,
        } => {
            let params = CreateInstanceParams {
                name,
                instance_type,
                region,
                elastic_ip: !no_elastic_ip,
            };
            instance::handle_create(&ctx, params).await
        }
        Commands::Start { id } => instance::handle_start(&ctx, id).await,
        Commands::Stop { id } => instance::handle_stop(&ctx, id).await,
        Commands::Terminate { id, yes } => instance::handle_terminate(&ctx, id, yes).await,
        Commands::Eip { action } => match action {
            EipAction::Associate { id } => instance::handle_associate(&ctx, id).await,
            EipAction::Disassociate { id, allocation_id } => {
                instance::handle_disassociate(&ctx, id, allocation_id).await
            }
        },
        Commands::Watch { id } => instance::handle_watch(&ctx, id).await,
        Commands::Types => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();

    if let Err(e) = run(args.command).await {
        match e.downcast_ref::<ConsoleError>() {
            Some(err) => eprintln!("Error: {}", err.localized()),
            None => eprintln!("Error: {}", e),
        }
        std::process::exit(1);
    }
}
