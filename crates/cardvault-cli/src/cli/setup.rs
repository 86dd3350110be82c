use cardvault::filter::SortOrder;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "cardvault", bin_name = "cardvault", version)]
#[command(about = "Track a collectible card inventory", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Identity to act as
    #[arg(long, global = true, env = "CARDVAULT_USER", help_heading = "Options")]
    pub user: Option<String>,

    /// Act with admin privileges
    #[arg(long, global = true, help_heading = "Options")]
    pub admin: bool,

    /// Whose cards to act on: self, all, or a user id
    #[arg(long, global = true, default_value = "self", help_heading = "Options")]
    pub scope: String,

    /// Print JSON instead of text
    #[arg(long, global = true, help_heading = "Options")]
    pub json: bool,

    /// Config file (defaults to the OS config directory)
    #[arg(long, global = true, value_name = "PATH", help_heading = "Options")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a card, or add to the quantity of an identical one
    #[command(display_order = 1)]
    Add {
        name: String,

        #[command(flatten)]
        details: CardDetails,

        /// How many copies (1-999)
        #[arg(short, long)]
        quantity: Option<i64>,

        /// Mark as favorite
        #[arg(long)]
        favorite: bool,

        /// Tag (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,

        /// Owner for the card (admin only)
        #[arg(long)]
        owner: Option<String>,
    },

    /// List cards
    #[command(alias = "ls", display_order = 2)]
    List {
        /// Match against name, set, number or rarity
        query: Option<String>,

        /// Only favorites
        #[arg(long)]
        favorites: bool,

        /// Only cards with this tag
        #[arg(long)]
        tag: Option<String>,

        /// Only cards of this type
        #[arg(long = "type", value_name = "TYPE")]
        card_type: Option<String>,

        #[arg(long, value_enum, default_value_t = SortArg::Insertion)]
        sort: SortArg,
    },

    /// Show one card
    #[command(display_order = 3)]
    Show { id: Uuid },

    /// Change fields of a card
    #[command(display_order = 4)]
    Update {
        id: Uuid,

        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        details: CardDetails,

        #[arg(short, long)]
        quantity: Option<i64>,

        /// Set the favorite flag
        #[arg(long, value_name = "BOOL")]
        favorite: Option<bool>,

        /// Replace all tags (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,

        /// Remove a field's value (repeatable)
        #[arg(long, value_enum, value_name = "FIELD")]
        clear: Vec<ClearField>,
    },

    /// Toggle the favorite flag
    #[command(alias = "fav", display_order = 5)]
    Favorite { id: Uuid },

    /// Delete a card
    #[command(alias = "rm", display_order = 6)]
    Delete { id: Uuid },

    /// Collection statistics
    #[command(display_order = 7)]
    Stats,

    /// Delete every card (requires --admin)
    #[command(display_order = 8)]
    Clear,
}

/// Descriptive fields shared by `add` and `update`.
#[derive(Args, Debug, Default)]
pub struct CardDetails {
    #[arg(long = "set", value_name = "SET")]
    pub set_name: Option<String>,

    #[arg(long = "number", value_name = "NUMBER")]
    pub card_number: Option<String>,

    #[arg(long)]
    pub rarity: Option<String>,

    /// Condition grade, 0.0 to 10.0
    #[arg(long)]
    pub grade: Option<f64>,

    #[arg(long)]
    pub price: Option<f64>,

    #[arg(long = "type", value_name = "TYPE")]
    pub card_type: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,

    #[arg(long)]
    pub image_url: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Insertion,
    Name,
    Newest,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Insertion => SortOrder::Insertion,
            SortArg::Name => SortOrder::Name,
            SortArg::Newest => SortOrder::Newest,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ClearField {
    Number,
    Rarity,
    Notes,
    ImageUrl,
    Tags,
}
