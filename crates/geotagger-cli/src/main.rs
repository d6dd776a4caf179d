//! Geotagger CLI - sign in, browse geotagged photos, guess where they were
//! taken, and check the leaderboard from the terminal.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use geotagger_core::activity::log_user_action;
use geotagger_core::auth::{
    handle_callback, provider_login_url, verify_session, Access, OAuthProvider, RouteGuard,
};
use geotagger_core::models::{
    Guess, Location, LoginRequest, NewGuess, NewLocation, Page, PasswordUpdate, ProfileUpdate,
    RegisterRequest, User, UserAction,
};
use geotagger_core::{routes, ApiClient, Config, LoginOutcome, SessionState, SessionStore, StorageKind};

/// Default number of leaderboard entries
const DEFAULT_BEST_LIMIT: u32 = 10;

#[derive(Parser)]
#[command(name = "geotagger")]
#[command(about = "Geotagger client - guess where photos were taken", long_about = None)]
struct Cli {
    /// API base URL (overrides GEOTAGGER_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Session storage backend: file, keyring or memory
    #[arg(long, global = true)]
    storage: Option<StorageKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Ask the server who the stored session belongs to
    Whoami,
    /// Show the local session state without contacting the server
    Status,
    /// Print the URL that starts sign-in with an identity provider
    OauthUrl { provider: OAuthProvider },
    /// Capture the token from an identity-provider redirect URL
    OauthCallback { url: String },
    /// Show the signed-in user with their uploaded locations
    Profile,
    /// Show another user's public profile
    User { id: String },
    /// Change your name or email
    UpdateProfile {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Change your password
    ChangePassword,
    /// Delete your account and sign out
    DeleteAccount {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// List locations
    Locations {
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        /// Only locations uploaded by the signed-in user
        #[arg(long)]
        mine: bool,
    },
    /// Show a single location
    Location { id: String },
    /// Show a random location to guess
    Random,
    /// Upload a location by image URL
    AddLocation {
        #[arg(long)]
        image: String,
        #[arg(long, allow_negative_numbers = true)]
        latitude: f64,
        #[arg(long, allow_negative_numbers = true)]
        longitude: f64,
    },
    /// Replace the image or coordinates of one of your locations
    EditLocation {
        id: String,
        #[arg(long)]
        image: String,
        #[arg(long, allow_negative_numbers = true)]
        latitude: f64,
        #[arg(long, allow_negative_numbers = true)]
        longitude: f64,
    },
    /// Delete one of your locations
    DeleteLocation { id: String },
    /// Guess where a location's photo was taken
    Guess {
        location_id: String,
        #[arg(allow_negative_numbers = true)]
        latitude: f64,
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
    },
    /// Show the closest guesses
    Best {
        #[arg(short, long, default_value_t = DEFAULT_BEST_LIMIT)]
        limit: u32,
    },
    /// Show recent user activity (admin only)
    Activity,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level (e.g., RUST_LOG=geotagger_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });

    let storage = cli.storage.unwrap_or(config.storage);
    let mut session = SessionStore::from_storage(storage.open());
    session.subscribe(|event, session| {
        debug!(?event, state = ?session.state(), "Session changed");
    });

    let api_url = config.api_url(cli.api_url.as_deref());
    info!(api_url = %api_url, ?storage, "Geotagger CLI starting");
    let api = ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Login { email } => login(&api, &mut session, &mut config, email).await,
        Commands::Register {
            first_name,
            last_name,
            email,
        } => register(&api, first_name, last_name, email).await,
        Commands::Logout => logout(&api, &mut session).await,
        Commands::Whoami => whoami(&api, &mut session).await,
        Commands::Status => {
            status(&session);
            Ok(())
        }
        Commands::OauthUrl { provider } => {
            println!("{}", provider_login_url(api.base_url(), provider)?);
            Ok(())
        }
        Commands::OauthCallback { url } => {
            let outcome = handle_callback(&url, &mut session);
            println!("{}", outcome.redirect());
            if let Some(hint) = partial_session_hint(&session) {
                eprintln!("Token captured. {}", hint);
            }
            Ok(())
        }
        Commands::Profile => profile(&api, &session).await,
        Commands::User { id } => {
            let user = api.with_session(&session).get_user(&id).await?;
            print_user(&user);
            Ok(())
        }
        Commands::UpdateProfile {
            first_name,
            last_name,
            email,
        } => {
            let update = ProfileUpdate {
                first_name,
                last_name,
                email,
            };
            update_profile(&api, &session, update).await
        }
        Commands::ChangePassword => change_password(&api, &session).await,
        Commands::DeleteAccount { yes } => delete_account(&api, &mut session, yes).await,
        Commands::Locations { page, mine } => {
            let client = if mine {
                authorized(&api, &session, routes::PROFILE)?
            } else {
                api.with_session(&session)
            };
            let page = if mine {
                client.my_locations(page).await?
            } else {
                client.locations(page).await?
            };
            print_location_page(&page);
            Ok(())
        }
        Commands::Location { id } => {
            let location = api.with_session(&session).location(&id).await?;
            print_location(&location);
            Ok(())
        }
        Commands::Random => {
            let location = api.with_session(&session).random_location().await?;
            print_location(&location);
            Ok(())
        }
        Commands::AddLocation {
            image,
            latitude,
            longitude,
        } => {
            let client = authorized(&api, &session, routes::ADD_LOCATION)?;
            let location = NewLocation {
                image,
                latitude,
                longitude,
            };
            client.create_location(&location).await?;
            log_user_action(
                &client,
                UserAction::new("add_location").value(format!("{},{}", latitude, longitude)),
            )
            .await;
            eprintln!("Location added.");
            award_points(&client, &session).await;
            Ok(())
        }
        Commands::EditLocation {
            id,
            image,
            latitude,
            longitude,
        } => {
            let client = authorized(&api, &session, routes::PROFILE)?;
            let location = NewLocation {
                image,
                latitude,
                longitude,
            };
            client.update_location(&id, &location).await?;
            log_user_action(
                &client,
                UserAction::new("edit_location")
                    .value(format!("{},{}", latitude, longitude))
                    .url(format!("{}/{}", routes::LOCATIONS, id)),
            )
            .await;
            eprintln!("Location updated.");
            award_points(&client, &session).await;
            Ok(())
        }
        Commands::DeleteLocation { id } => {
            let client = authorized(&api, &session, routes::LOCATIONS)?;
            client.delete_location(&id).await?;
            log_user_action(&client, UserAction::new("delete_location").value(id)).await;
            eprintln!("Location deleted.");
            Ok(())
        }
        Commands::Guess {
            location_id,
            latitude,
            longitude,
        } => guess(&api, &session, location_id, latitude, longitude).await,
        Commands::Best { limit } => {
            let guesses = api.with_session(&session).best_guesses(limit).await?;
            print_leaderboard(&guesses);
            Ok(())
        }
        Commands::Activity => {
            let client = authorized(&api, &session, routes::HOME)?;
            for entry in client.recent_user_actions().await? {
                println!(
                    "{:<20} {:<8} {:<20} {}",
                    entry.created_at.as_deref().unwrap_or("-"),
                    entry.user_id.as_deref().unwrap_or("-"),
                    entry.action,
                    entry.new_value.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
    }
}

/// A token without an expiry (as left by an OAuth redirect) works for
/// `whoami` but does not pass the route guard.
fn partial_session_hint(session: &SessionStore) -> Option<&'static str> {
    (session.state() == SessionState::PartialCredential).then_some(
        "The token has no expiry, so commands that need a session will refuse it. \
         `geotagger whoami` can check it; run `geotagger login` to sign in fully.",
    )
}

/// A client for `route`, or an error pointing at the login redirect.
fn authorized(api: &ApiClient, session: &SessionStore, route: &str) -> Result<ApiClient> {
    match RouteGuard::default().check(session, route) {
        Access::Allowed => Ok(api.with_session(session)),
        Access::Redirect(to) => {
            debug!(redirect = %to, "Route guard denied access");
            bail!("Not signed in or session expired - run `geotagger login`")
        }
    }
}

async fn login(
    api: &ApiClient,
    session: &mut SessionStore,
    config: &mut Config,
    email: Option<String>,
) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", email))
        .context("Failed to read password")?;

    let request = LoginRequest {
        email: email.clone(),
        password,
    };
    match api.signin(&request).await? {
        LoginOutcome::Success(auth) => {
            let name = auth.user.full_name();
            session.login(auth);

            config.last_email = Some(email);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            if !session.is_persistent() {
                eprintln!("Warning: session storage unavailable, you will need to sign in again.");
            }
            eprintln!("Signed in as {}.", name);
            log_user_action(&api.with_session(session), UserAction::new("login")).await;
            Ok(())
        }
        LoginOutcome::Rejected(message) => bail!("Sign in failed: {}", message),
    }
}

async fn register(api: &ApiClient, first_name: String, last_name: String, email: String) -> Result<()> {
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    let confirm_password =
        rpassword::prompt_password("Confirm password: ").context("Failed to read password")?;
    if password != confirm_password {
        bail!("Passwords do not match");
    }

    let request = RegisterRequest {
        first_name,
        last_name,
        email,
        password,
        confirm_password,
    };
    let user = api.signup(&request).await?;
    eprintln!("Account created for {}. Run `geotagger login` to sign in.", user.full_name());
    Ok(())
}

async fn logout(api: &ApiClient, session: &mut SessionStore) -> Result<()> {
    if session.credential().is_some() {
        let client = api.with_session(session);
        log_user_action(&client, UserAction::new("logout")).await;
        if let Err(e) = client.signout().await {
            warn!(error = %e, "Server-side sign out failed");
        }
    }
    session.signout();
    eprintln!("Signed out.");
    Ok(())
}

async fn whoami(api: &ApiClient, session: &mut SessionStore) -> Result<()> {
    if session.credential().is_none() {
        bail!("Not signed in - run `geotagger login`");
    }
    match verify_session(api, session).await? {
        Some(user) => {
            print_user(&user);
            if let Some(hint) = partial_session_hint(session) {
                eprintln!("{}", hint);
            }
            Ok(())
        }
        None => bail!("Session rejected by the server - run `geotagger login`"),
    }
}

fn status(session: &SessionStore) {
    let state = match session.state() {
        SessionState::Empty => "signed out",
        SessionState::PartialCredential => "token only (no expiry)",
        SessionState::Authenticated => "signed in",
        SessionState::Expired => "expired",
    };
    println!("Session:  {}", state);
    if let Some(user) = session.user() {
        println!("User:     {} <{}>", user.full_name(), user.email);
    }
    if session.credential().is_some() {
        println!("Scheme:   {}", session.credential_scheme());
    }
    if let Some(expiry) = session.expiry() {
        let remaining = expiry - chrono::Utc::now();
        if remaining.num_seconds() > 0 {
            println!("Expires:  {} ({}m left)", expiry.to_rfc3339(), remaining.num_minutes());
        } else {
            println!("Expired:  {}", expiry.to_rfc3339());
        }
    } else if let Some(raw) = session.expires_at() {
        println!("Expires:  {} (unreadable)", raw);
    }
    println!("Storage:  {}", if session.is_persistent() { "persistent" } else { "memory only" });
}

async fn profile(api: &ApiClient, session: &SessionStore) -> Result<()> {
    let client = authorized(api, session, routes::PROFILE)?;
    let (user, locations) = futures::try_join!(client.current_user(), client.my_locations(1))?;
    print_user(&user);
    println!();
    print_location_page(&locations);
    Ok(())
}

async fn guess(
    api: &ApiClient,
    session: &SessionStore,
    location_id: String,
    latitude: f64,
    longitude: f64,
) -> Result<()> {
    let client = authorized(api, session, routes::LOCATIONS)?;
    let user_id = current_user_id(&client, session).await?;

    let request = NewGuess {
        latitude,
        longitude,
        user_id,
        location_id: location_id.clone(),
    };
    let scored = client.create_guess(&location_id, &request).await?;
    log_user_action(
        &client,
        UserAction::new("guess")
            .component("location")
            .value(format!("{},{}", latitude, longitude))
            .url(format!("{}/{}", routes::LOCATIONS, location_id)),
    )
    .await;

    match scored {
        Some(guess) => eprintln!("Guess recorded: off by {}.", guess.distance_display()),
        None => eprintln!("Guess recorded."),
    }
    Ok(())
}

/// The signed-in user's id, from the session or the server.
async fn current_user_id(client: &ApiClient, session: &SessionStore) -> Result<String> {
    match session.user() {
        Some(user) => Ok(user.id.clone()),
        None => Ok(client.current_user().await?.id),
    }
}

/// Uploading or editing a location earns points. Failure is reported, not fatal.
async fn award_points(client: &ApiClient, session: &SessionStore) {
    let result = match current_user_id(client, session).await {
        Ok(id) => client.add_points(&id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(award) => match award.points_value() {
            Some(points) => eprintln!("You now have {} points.", points),
            None => eprintln!("Points added."),
        },
        Err(e) => {
            warn!(error = %e, "Failed to add points");
            eprintln!("Could not add points, try again later.");
        }
    }
}

async fn update_profile(api: &ApiClient, session: &SessionStore, update: ProfileUpdate) -> Result<()> {
    if update.first_name.is_none() && update.last_name.is_none() && update.email.is_none() {
        bail!("Nothing to update - pass --first-name, --last-name or --email");
    }
    let client = authorized(api, session, routes::PROFILE_SETTINGS)?;
    client.update_profile(&update).await?;
    log_user_action(&client, UserAction::new("update_profile").component("profile")).await;
    eprintln!("Profile updated. Run `geotagger whoami` to see the changes.");
    Ok(())
}

async fn change_password(api: &ApiClient, session: &SessionStore) -> Result<()> {
    let client = authorized(api, session, routes::PROFILE_SETTINGS)?;
    let current_password =
        rpassword::prompt_password("Current password: ").context("Failed to read password")?;
    let password = rpassword::prompt_password("New password: ").context("Failed to read password")?;
    let password_confirmation =
        rpassword::prompt_password("Confirm new password: ").context("Failed to read password")?;
    if password != password_confirmation {
        bail!("Passwords do not match");
    }

    let update = PasswordUpdate {
        current_password,
        password,
        password_confirmation,
    };
    client.update_password(&update).await?;
    log_user_action(&client, UserAction::new("change_password").component("profile")).await;
    eprintln!("Password changed.");
    Ok(())
}

async fn delete_account(api: &ApiClient, session: &mut SessionStore, yes: bool) -> Result<()> {
    let client = authorized(api, session, routes::PROFILE_SETTINGS)?;
    let user_id = current_user_id(&client, session).await?;
    if !yes {
        let answer = prompt("Delete your account permanently? Type 'yes' to confirm: ")?;
        if answer != "yes" {
            bail!("Account not deleted");
        }
    }

    client.delete_user(&user_id).await?;
    session.signout();
    eprintln!("Account deleted.");
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        bail!("No value entered");
    }
    Ok(value)
}

fn print_user(user: &User) {
    println!("{} <{}>", user.full_name(), user.email);
    println!("  id:     {}", user.id);
    println!("  points: {}", user.points_value());
    if let Some(ref role) = user.role {
        println!("  role:   {}", role);
    }
}

fn print_location(location: &Location) {
    let owner = location
        .user
        .as_ref()
        .map(|u| u.full_name())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:<8} {:>10.5} {:>11.5}  {:<20} {}",
        location.id, location.latitude, location.longitude, owner, location.image
    );
}

fn print_location_page(page: &Page<Location>) {
    if page.data.is_empty() {
        println!("No locations.");
        return;
    }
    for location in &page.data {
        print_location(location);
    }
    if page.last_page > 1 {
        println!("Page {} of {}", page.current_page, page.last_page);
    }
}

fn print_leaderboard(guesses: &[Guess]) {
    if guesses.is_empty() {
        println!("No guesses yet.");
        return;
    }
    for (rank, guess) in guesses.iter().enumerate() {
        let who = guess
            .user
            .as_ref()
            .map(|u| u.full_name())
            .unwrap_or_else(|| "-".to_string());
        println!("{:>3}. {:<24} {:>10}", rank + 1, who, guess.distance_display());
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use geotagger_core::auth::MemoryStore;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_guess_accepts_negative_coordinates() {
        let cli = Cli::try_parse_from(["geotagger", "guess", "5", "-33.86", "-151.2"]).unwrap();
        match cli.command {
            Commands::Guess {
                location_id,
                latitude,
                longitude,
            } => {
                assert_eq!(location_id, "5");
                assert_eq!(latitude, -33.86);
                assert_eq!(longitude, -151.2);
            }
            _ => panic!("expected guess command"),
        }
    }

    #[test]
    fn test_global_flags_parse() {
        let cli = Cli::try_parse_from([
            "geotagger",
            "status",
            "--storage",
            "memory",
            "--api-url",
            "https://api.example.com/",
        ])
        .unwrap();
        assert_eq!(cli.storage, Some(StorageKind::Memory));
        assert_eq!(cli.api_url.as_deref(), Some("https://api.example.com/"));
        assert!(Cli::try_parse_from(["geotagger", "status", "--storage", "cloud"]).is_err());
    }

    #[test]
    fn test_edit_location_arguments() {
        let cli = Cli::try_parse_from([
            "geotagger",
            "edit-location",
            "7",
            "--image",
            "https://img.example.com/a.jpg",
            "--latitude",
            "-12.5",
            "--longitude",
            "-70.25",
        ])
        .unwrap();
        match cli.command {
            Commands::EditLocation {
                id,
                image,
                latitude,
                longitude,
            } => {
                assert_eq!(id, "7");
                assert_eq!(image, "https://img.example.com/a.jpg");
                assert_eq!(latitude, -12.5);
                assert_eq!(longitude, -70.25);
            }
            _ => panic!("expected edit-location command"),
        }
    }

    #[test]
    fn test_update_profile_fields_are_optional() {
        let cli = Cli::try_parse_from(["geotagger", "update-profile", "--first-name", "Ada"]).unwrap();
        match cli.command {
            Commands::UpdateProfile {
                first_name,
                last_name,
                email,
            } => {
                assert_eq!(first_name.as_deref(), Some("Ada"));
                assert!(last_name.is_none());
                assert!(email.is_none());
            }
            _ => panic!("expected update-profile command"),
        }
        assert!(matches!(
            Cli::try_parse_from(["geotagger", "delete-account", "--yes"]).unwrap().command,
            Commands::DeleteAccount { yes: true }
        ));
    }

    #[test]
    fn test_partial_session_hint_only_for_token_without_expiry() {
        let mut session = SessionStore::open(MemoryStore::new());
        assert!(partial_session_hint(&session).is_none());

        session.set_token("oauth-token");
        let hint = partial_session_hint(&session).unwrap();
        assert!(hint.contains("geotagger login"));
        assert!(matches!(
            authorized(&ApiClient::new("http://localhost/").unwrap(), &session, routes::PROFILE),
            Err(_)
        ));

        session.signout();
        assert!(partial_session_hint(&session).is_none());
    }

    #[test]
    fn test_oauth_provider_argument() {
        let cli = Cli::try_parse_from(["geotagger", "oauth-url", "google"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::OauthUrl {
                provider: OAuthProvider::Google
            }
        ));
    }
}
