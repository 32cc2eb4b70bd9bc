mod clipboard;
mod config;
mod entry;
mod filter;
mod gate;
mod generator;
mod pin;
mod prompt;
mod score;
mod session;
mod store;
mod strength;
mod theme;
mod vault;

use crate::clipboard::copy_to_clipboard;
use crate::config::{SettingKey, Settings};
use crate::entry::{Category, Entry, EntryDraft, EntryPatch};
use crate::filter::FilterMode;
use crate::gate::{BiometricProvider, NoBiometrics, RevealGate, run_reveal};
use crate::generator::{GeneratorOptions, SymbolSet};
use crate::pin::load_pin;
use crate::prompt::{confirm, prompt_optional, prompt_password_hidden, prompt_pin, prompt_string};
use crate::score::{HealthReport, ScoreTier};
use crate::session::{AppLock, PinPrompt, mark_welcome_seen, session_path, setup_pin};
use crate::store::{FileStore, KvStore, store_root};
use crate::theme::{Theme, bar};
use crate::vault::{Vault, VaultError, resolve_selector};
use anyhow::{Context, bail};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "passbook",
    version,
    about = "Password book with strength scoring and PIN-protected reveal"
)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug); RUST_LOG wins
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the store and set up the unlock PIN
    Init,

    /// Add a new entry
    ///
    /// Примеры:
    ///   passbook add github
    ///   passbook add "my bank" --category bank --protect
    ///   passbook add netflix --generate --length 20
    Add {
        /// Service name, e.g. "github"
        service: Option<String>,
        /// Username or e-mail
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long, value_enum)]
        category: Option<Category>,
        /// Ask for PIN or biometrics before the password is shown
        #[arg(long)]
        protect: bool,
        #[arg(long)]
        notes: Option<String>,
        /// Generate the password instead of asking for it
        #[arg(short, long)]
        generate: bool,
        /// Generated password length (6..=32)
        #[arg(long, default_value_t = generator::DEFAULT_LENGTH)]
        length: usize,
    },

    /// List entries, optionally filtered
    ///
    /// Примеры:
    ///   passbook ls
    ///   passbook ls mail --favorites
    ///   passbook ls --category bank
    Ls {
        /// Substring of service, username or notes
        query: Option<String>,
        #[arg(long, conflicts_with = "category")]
        favorites: bool,
        #[arg(long, value_enum)]
        category: Option<Category>,
    },

    /// Search entries (an empty query finds nothing)
    Search { query: String },

    /// Show an entry; the password goes through the reveal check
    Show {
        /// List position or id prefix (see `passbook ls`)
        sel: String,
        /// Print only the password
        #[arg(long, conflicts_with = "json")]
        password_only: bool,
        /// Print the entry as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy a field to the clipboard
    Clip {
        sel: String,
        /// Field to copy (password by default)
        #[arg(long, value_enum)]
        field: Option<ClipField>,
    },

    /// Change fields of an entry
    ///
    /// Примеры:
    ///   passbook edit 0 --username me@example.com
    ///   passbook edit 3f2a --password
    ///   passbook edit 2 --category none --protect off
    Edit {
        sel: String,
        #[arg(long)]
        service: Option<String>,
        #[arg(short, long)]
        username: Option<String>,
        /// Ask for a new password
        #[arg(short, long, conflicts_with = "generate")]
        password: bool,
        /// Replace the password with a generated one
        #[arg(short, long)]
        generate: bool,
        #[arg(long, default_value_t = generator::DEFAULT_LENGTH)]
        length: usize,
        /// Category id, or "none" to remove it
        #[arg(short, long)]
        category: Option<CategoryArg>,
        #[arg(long, value_enum)]
        protect: Option<Toggle>,
        /// New notes; an empty string removes them
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete an entry
    Rm {
        sel: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Toggle the favorite mark
    Fav { sel: String },

    /// Generate a password without saving it
    ///
    /// Примеры:
    ///   passbook gen
    ///   passbook gen --length 24 --no-symbols
    Gen {
        /// Password length (6..=32)
        #[arg(short, long, default_value_t = generator::DEFAULT_LENGTH)]
        length: usize,
        #[arg(long)]
        no_upper: bool,
        #[arg(long)]
        no_lower: bool,
        #[arg(long)]
        no_digits: bool,
        #[arg(long)]
        no_symbols: bool,
    },

    /// Rate a password (asked without echo if not given)
    Check { password: Option<String> },

    /// Security score and weak passwords
    Stats,

    /// Most recently added entries
    Recent {
        #[arg(short = 'n', long, default_value_t = 3)]
        limit: usize,
    },

    /// Show or change settings
    ///
    /// Примеры:
    ///   passbook settings
    ///   passbook settings set dark-mode on
    Settings {
        #[command(subcommand)]
        cmd: Option<SettingsCommands>,
    },

    /// Forget the unlock session
    Lock,

    /// Delete all entries, settings and the PIN
    Clear {
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCommands {
    /// Print all settings
    Show,
    /// Turn a setting on or off
    Set {
        #[arg(value_enum)]
        key: SettingKey,
        #[arg(value_enum)]
        value: Toggle,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ClipField {
    Password,
    Username,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn is_on(self) -> bool {
        self == Toggle::On
    }
}

/// Категория для `edit`: id категории или `none`.
#[derive(Copy, Clone, Debug)]
struct CategoryArg(Option<Category>);

impl std::str::FromStr for CategoryArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("none") {
            return Ok(CategoryArg(None));
        }
        Category::from_id(&s.to_lowercase())
            .map(|c| CategoryArg(Some(c)))
            .ok_or_else(|| {
                let ids: Vec<_> = Category::ALL.iter().map(|c| c.id()).collect();
                format!("unknown category `{s}`, expected one of: {}, none", ids.join(", "))
            })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Init => cmd_init()?,
        Commands::Add {
            service,
            username,
            category,
            protect,
            notes,
            generate,
            length,
        } => {
            let draft = EntryDraft {
                service: service.unwrap_or_default(),
                username: username.unwrap_or_default(),
                category,
                requires_auth_to_reveal: protect,
                notes,
                ..Default::default()
            };
            cmd_add(draft, generate.then_some(length))?
        }
        Commands::Ls {
            query,
            favorites,
            category,
        } => {
            let mode = match (favorites, category) {
                (true, _) => FilterMode::Favorites,
                (false, Some(cat)) => FilterMode::Category(cat),
                (false, None) => FilterMode::All,
            };
            cmd_ls(query.as_deref().unwrap_or(""), mode)?
        }
        Commands::Search { query } => cmd_search(&query)?,
        Commands::Show {
            sel,
            password_only,
            json,
        } => cmd_show(&sel, password_only, json)?,
        Commands::Clip { sel, field } => cmd_clip(&sel, field.unwrap_or(ClipField::Password))?,
        Commands::Edit {
            sel,
            service,
            username,
            password,
            generate,
            length,
            category,
            protect,
            notes,
        } => {
            let secret = if generate {
                Some(generated(SymbolSet::Entry, length))
            } else if password {
                Some(prompt_password_hidden("New password: ")?)
            } else {
                None
            };
            let patch = EntryPatch {
                service,
                username,
                secret,
                category: category.map(|c| c.0),
                requires_auth_to_reveal: protect.map(Toggle::is_on),
                notes: notes.map(|n| Some(n).filter(|n| !n.trim().is_empty())),
            };
            cmd_edit(&sel, patch)?
        }
        Commands::Rm { sel, yes } => cmd_rm(&sel, yes)?,
        Commands::Fav { sel } => cmd_fav(&sel)?,
        Commands::Gen {
            length,
            no_upper,
            no_lower,
            no_digits,
            no_symbols,
        } => {
            let opts = GeneratorOptions {
                length: generator::clamp_length(length),
                upper: !no_upper,
                lower: !no_lower,
                digits: !no_digits,
                symbols: !no_symbols,
                symbol_set: SymbolSet::Standalone,
            };
            cmd_gen(&opts)?
        }
        Commands::Check { password } => cmd_check(password)?,
        Commands::Stats => cmd_stats()?,
        Commands::Recent { limit } => cmd_recent(limit)?,
        Commands::Settings { cmd } => match cmd.unwrap_or(SettingsCommands::Show) {
            SettingsCommands::Show => cmd_settings_show()?,
            SettingsCommands::Set { key, value } => cmd_settings_set(key, value.is_on())?,
        },
        Commands::Lock => cmd_lock()?,
        Commands::Clear { yes } => cmd_clear(yes)?,
    }

    Ok(())
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout занят паролями и списками, логи только в stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Открытое хранилище после разблокировки.
struct App {
    vault: Vault<FileStore>,
    settings: Settings,
    lock: AppLock,
    theme: Theme,
}

const BIOMETRICS: NoBiometrics = NoBiometrics;

fn ask_pin(prompt: PinPrompt) -> anyhow::Result<pin::PinEntry> {
    prompt_pin(prompt.label())
}

fn print_welcome_once<S: KvStore>(store: &mut S) -> anyhow::Result<()> {
    if mark_welcome_seen(store)? {
        eprintln!(
            "Welcome to passbook!\n\
             Entries are stored as plain JSON files readable by your user account.\n\
             The PIN only guards what is shown on screen, it does not encrypt anything."
        );
    }
    Ok(())
}

fn open_app() -> anyhow::Result<App> {
    let mut store = FileStore::open_default().context("cannot open the password store")?;
    let settings = Settings::load(&store)?;
    print_welcome_once(&mut store)?;

    let lock = AppLock::new(session_path(store.root()));
    lock.unlock(&mut store, &settings, &BIOMETRICS, ask_pin)?;

    Ok(App {
        vault: Vault::open(store)?,
        settings,
        lock,
        theme: Theme::from_settings(&settings),
    })
}

impl App {
    fn entries(&self) -> anyhow::Result<Vec<Entry>> {
        Ok(self.vault.load_all()?)
    }

    /// Найти запись по селектору в той же загрузке коллекции.
    fn select(&self, sel: &str) -> anyhow::Result<(Uuid, Entry)> {
        let entries = self.entries()?;
        let id = resolve_selector(&entries, sel)?;
        let entry = entries
            .into_iter()
            .find(|e| e.id == id)
            .ok_or(VaultError::NotFound(id))?;
        Ok((id, entry))
    }

    /// Одно нажатие "показать" для записи.
    fn reveal(&self, entry: &Entry) -> anyhow::Result<bool> {
        let mut gate = RevealGate::mount(entry, &BIOMETRICS);
        let stored = load_pin(self.vault.store())?;
        run_reveal(
            &mut gate,
            &BIOMETRICS,
            stored.as_deref().map(String::as_str),
            || prompt_pin(PinPrompt::Enter.label()),
        )?;
        Ok(gate.is_revealed())
    }

    fn print_row(&self, pos: usize, e: &Entry) {
        let star = if e.is_favorite { " *" } else { "" };
        println!(
            "{pos:>3}  {}  {:<24} {}{star}",
            self.theme.paint(self.theme.palette.primary, &e.short_id()),
            self.theme.paint(&e.category_color, &format!("[{}] {}", e.icon_key, e.service)),
            self.theme.paint(self.theme.palette.secondary_text, &e.username),
        );
    }

    fn print_rows<'a>(&self, rows: impl IntoIterator<Item = (usize, &'a Entry)>) -> usize {
        let mut n = 0;
        for (pos, e) in rows {
            self.print_row(pos, e);
            n += 1;
        }
        n
    }
}

fn generated(symbols: SymbolSet, length: usize) -> String {
    let opts = GeneratorOptions {
        length: generator::clamp_length(length),
        ..GeneratorOptions::new(symbols)
    };
    generator::generate(&opts)
}

fn strength_line(theme: &Theme, password: &str) -> String {
    let s = strength::classify(password);
    format!(
        "{} {}",
        theme.paint(s.color(), &bar(s.fill_percent(), 12)),
        theme.paint(s.color(), s.label.as_str())
    )
}

fn cmd_init() -> anyhow::Result<()> {
    let mut store = FileStore::open_default().context("cannot open the password store")?;
    print_welcome_once(&mut store)?;

    if load_pin(&store)?.is_some() {
        println!("Store already initialized at {}", store.root().display());
        return Ok(());
    }

    setup_pin(&mut store, ask_pin)?;
    println!("Initialized store at {}", store.root().display());
    Ok(())
}

fn cmd_add(mut draft: EntryDraft, generate: Option<usize>) -> anyhow::Result<()> {
    let mut app = open_app()?;

    if draft.service.trim().is_empty() {
        draft.service = prompt_string("Service: ")?;
    }
    if draft.username.trim().is_empty() {
        draft.username = prompt_string("Username: ")?;
    }
    draft.secret = match generate {
        Some(length) => generated(SymbolSet::Entry, length),
        None => {
            let pw = prompt_password_hidden("Password (leave empty to generate): ")?;
            if pw.is_empty() {
                generated(SymbolSet::Entry, generator::DEFAULT_LENGTH)
            } else {
                pw
            }
        }
    };
    if draft.notes.is_none() {
        draft.notes = prompt_optional("Notes (optional): ")?;
    }

    let entry = app.vault.add(draft)?;
    println!(
        "Saved {} ({})  {}",
        entry.service,
        entry.short_id(),
        strength_line(&app.theme, &entry.secret)
    );
    Ok(())
}

fn cmd_ls(query: &str, mode: FilterMode) -> anyhow::Result<()> {
    let app = open_app()?;
    let entries = app.entries()?;
    if app.print_rows(filter::filter(&entries, query, mode)) == 0 && !entries.is_empty() {
        eprintln!("No entries match.");
    }
    Ok(())
}

fn cmd_search(query: &str) -> anyhow::Result<()> {
    let app = open_app()?;
    let entries = app.entries()?;
    if app.print_rows(filter::search(&entries, query)) == 0 {
        eprintln!("Nothing found.");
    }
    Ok(())
}

fn cmd_recent(limit: usize) -> anyhow::Result<()> {
    let app = open_app()?;
    let entries = app.entries()?;
    app.print_rows(filter::recent(&entries, limit));
    Ok(())
}

fn cmd_show(sel: &str, password_only: bool, json: bool) -> anyhow::Result<()> {
    let app = open_app()?;
    let (_, entry) = app.select(sel)?;
    let revealed = app.reveal(&entry)?;

    if password_only {
        if !revealed {
            bail!("password stays hidden");
        }
        println!("{}", entry.secret);
        return Ok(());
    }

    if json {
        let mut out = entry.clone();
        if !revealed {
            out.secret.clear();
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Service:  {}", entry.service);
    println!("Username: {}", entry.username);
    if revealed {
        println!("Password: {}", entry.secret);
    } else {
        println!("Password: ********");
    }
    println!("Strength: {}", strength_line(&app.theme, &entry.secret));
    if let Some(cat) = entry.category {
        println!("Category: {}", app.theme.paint(cat.color(), cat.name()));
    }
    if let Some(ref notes) = entry.notes {
        println!("Notes:    {notes}");
    }
    if let Some(ref created) = entry.created_at {
        println!("Created:  {created}");
    }
    println!("Favorite: {}", if entry.is_favorite { "yes" } else { "no" });
    println!("Id:       {}", entry.id);
    Ok(())
}

fn cmd_clip(sel: &str, field: ClipField) -> anyhow::Result<()> {
    let app = open_app()?;
    let (_, entry) = app.select(sel)?;

    let value = match field {
        ClipField::Password => {
            if !app.reveal(&entry)? {
                bail!("password stays hidden");
            }
            entry.secret.clone()
        }
        ClipField::Username => entry.username.clone(),
    };

    copy_to_clipboard(&value)?;
    println!(
        "{} copied to clipboard.",
        match field {
            ClipField::Password => "Password",
            ClipField::Username => "Username",
        }
    );
    Ok(())
}

fn cmd_edit(sel: &str, patch: EntryPatch) -> anyhow::Result<()> {
    if patch.is_empty() {
        bail!("nothing to change, see `passbook edit --help`");
    }
    let mut app = open_app()?;
    let (id, entry) = app.select(sel)?;

    // снять защиту можно только пройдя ту же проверку
    if entry.requires_auth_to_reveal && patch.changes_protection(&entry) && !app.reveal(&entry)? {
        bail!("protection left unchanged");
    }

    let updated = app.vault.update(id, &patch)?;
    println!("Updated {} ({})", updated.service, updated.short_id());
    if patch.secret.is_some() {
        println!("Strength: {}", strength_line(&app.theme, &updated.secret));
    }
    Ok(())
}

fn cmd_rm(sel: &str, yes: bool) -> anyhow::Result<()> {
    let mut app = open_app()?;
    let (id, entry) = app.select(sel)?;

    if !yes && !confirm(&format!("Delete {} ({})?", entry.service, entry.username))? {
        println!("Kept.");
        return Ok(());
    }
    let removed = app.vault.delete(id)?;
    println!("Deleted {}", removed.service);
    Ok(())
}

fn cmd_fav(sel: &str) -> anyhow::Result<()> {
    let mut app = open_app()?;
    let (id, entry) = app.select(sel)?;
    let now = app.vault.toggle_favorite(id)?;
    println!(
        "{} {} favorites",
        entry.service,
        if now { "added to" } else { "removed from" }
    );
    Ok(())
}

fn cmd_gen(opts: &GeneratorOptions) -> anyhow::Result<()> {
    let password = generator::generate(opts);
    if password.is_empty() {
        println!("Select at least one option");
        return Ok(());
    }
    println!("{password}");

    let theme = Theme::from_settings(&Settings::default());
    eprintln!("{}", strength_line(&theme, &password));
    Ok(())
}

fn cmd_check(password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_password_hidden("Password to check: ")?,
    };
    let theme = Theme::from_settings(&Settings::default());
    let points = score::score(&password);

    println!("Strength: {}", strength_line(&theme, &password));
    println!(
        "Score:    {}",
        theme.paint(theme.tier_color(ScoreTier::of(points)), &format!("{points}/100"))
    );
    Ok(())
}

fn cmd_stats() -> anyhow::Result<()> {
    let app = open_app()?;
    let entries = app.entries()?;
    let report = HealthReport::of(&entries);
    let theme = &app.theme;
    let color = theme.tier_color(report.tier);

    println!(
        "Security score: {} {}",
        theme.paint(color, &format!("{}/100", report.score)),
        theme.paint(color, &bar(report.score, 20))
    );
    println!("{}", report.tier.advice());
    println!(
        "Passwords: {}   Strong: {}   Weak: {}",
        report.total,
        report.strong.len(),
        report.weak.len()
    );

    if !report.weak.is_empty() {
        println!();
        println!("{}", theme.paint(theme.palette.low_security, "Weak passwords:"));
        for e in &report.weak {
            println!("  {}  {} ({})", e.short_id(), e.service, e.username);
        }
    }

    println!();
    println!("By category:");
    for (cat, n) in &report.by_category {
        let (name, color) = match cat {
            Some(c) => (c.name(), c.color()),
            None => ("Uncategorized", entry::DEFAULT_COLOR),
        };
        println!("  {:<14} {n}", theme.paint(color, name));
    }
    Ok(())
}

fn cmd_settings_show() -> anyhow::Result<()> {
    let app = open_app()?;
    for (name, on) in app.settings.entries() {
        println!("{name:<16} {}", if on { "on" } else { "off" });
    }
    Ok(())
}

fn cmd_settings_set(key: SettingKey, value: bool) -> anyhow::Result<()> {
    let mut app = open_app()?;
    let mut settings = app.settings;
    settings.set(key, value);
    settings.save(app.vault.store_mut())?;

    if key == SettingKey::BiometricAuth && value && !BIOMETRICS.is_available() {
        eprintln!("No biometrics on this device, the PIN will keep being used.");
    }
    // новый срок сессии применится при следующей разблокировке
    if key == SettingKey::AutoLock {
        app.lock.lock()?;
    }
    println!(
        "{} is now {}",
        key.to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default(),
        if settings.get(key) { "on" } else { "off" }
    );
    Ok(())
}

fn cmd_lock() -> anyhow::Result<()> {
    let lock = AppLock::new(session_path(&store_root()?));
    lock.lock()?;
    println!("Locked.");
    Ok(())
}

fn cmd_clear(yes: bool) -> anyhow::Result<()> {
    let mut app = open_app()?;
    if !yes && !confirm("Delete ALL entries, settings and the PIN?")? {
        println!("Nothing deleted.");
        return Ok(());
    }
    app.vault.store_mut().clear()?;
    app.lock.lock()?;
    tracing::info!("store cleared");
    println!("All data cleared.");
    Ok(())
}
