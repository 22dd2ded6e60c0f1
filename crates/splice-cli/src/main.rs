//! `splice`: moderator tool for splitting and merging forum topics.
//!
//! Reads `splice.toml` (or the path given with `--config`), layers any
//! `SPLICE_*` environment variables on top, opens the SQLite store and runs
//! one command. Outcomes are printed to stdout as JSON.
//!
//! # Usage
//!
//! ```
//! splice seed-demo
//! splice split 1 --from 3 --subject "Off-topic tangent"
//! splice merge 1 2 --redirect
//! splice show 1
//! ```

mod hooks;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{ArgGroup, Parser, Subcommand};
use hooks::{TracingNotifier, TracingSearchIndex};
use serde::{Deserialize, Serialize};
use splice_core::{
  ids::{BoardId, MemberId, MessageId, PollId, TopicId},
  merge::{MergeOptions, MergeRequest, SubjectChoice},
  moderator::Moderator,
  redirect::RedirectOptions,
  settings::EngineSettings,
  split::{SplitRequest, SplitSelection},
  store::ForumStore,
};
use splice_store_sqlite::{NewPost, PostTarget, SqliteStore};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "splice", author, version, about = "Split and merge forum topics")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "splice.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Move messages out of a topic into a new one.
  #[command(group(ArgGroup::new("selection").required(true).args(["only", "from", "messages"])))]
  Split {
    topic:    i64,
    /// Move this single message.
    #[arg(long)]
    only:     Option<i64>,
    /// Move this message and every later one.
    #[arg(long)]
    from:     Option<i64>,
    /// Move exactly these messages (comma separated).
    #[arg(long, value_delimiter = ',')]
    messages: Vec<i64>,
    /// Subject of the new topic.
    #[arg(long)]
    subject:  String,
    /// Board for the new topic; defaults to the source topic's board.
    #[arg(long)]
    board:    Option<i64>,
  },

  /// Merge two or more topics into the oldest one.
  Merge {
    #[arg(required = true, num_args = 2..)]
    topics:          Vec<i64>,
    #[arg(long)]
    board:           Option<i64>,
    /// Custom subject for the merged topic.
    #[arg(long, conflicts_with = "subject_from")]
    subject:         Option<String>,
    /// Take the subject of this source topic.
    #[arg(long)]
    subject_from:    Option<i64>,
    /// Poll to keep when several sources have one.
    #[arg(long)]
    poll:            Option<i64>,
    /// Rewrite every merged message's subject.
    #[arg(long)]
    enforce_subject: bool,
    /// Leave a locked redirect topic in place of each merged source.
    #[arg(long)]
    redirect:        bool,
    /// Redirect message body; `[TOPIC LINK]` becomes a link to the result.
    #[arg(long, requires = "redirect")]
    reason:          Option<String>,
  },

  /// Print a topic with its messages.
  Show { topic: i64 },

  /// Print the moderation log.
  Log,

  /// Populate the store with a small board to experiment on.
  SeedDemo,
}

// ─── Config file ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct CliConfig {
  store_path:              PathBuf,
  subject_max_chars:       usize,
  reply_prefix:            String,
  redirect_subject_prefix: String,
  topic_link_template:     String,
  /// Lifetime of redirect topics in seconds; zero keeps them forever.
  redirect_ttl_secs:       u64,
  moderator_id:            i64,
  moderator_name:          String,
}

impl Default for CliConfig {
  fn default() -> Self {
    let engine = EngineSettings::default();
    Self {
      store_path:              PathBuf::from("splice.db"),
      subject_max_chars:       engine.subject_max_chars,
      reply_prefix:            engine.reply_prefix,
      redirect_subject_prefix: engine.redirect_subject_prefix,
      topic_link_template:     engine.topic_link_template,
      redirect_ttl_secs:       0,
      moderator_id:            1,
      moderator_name:          "Moderator".into(),
    }
  }
}

impl CliConfig {
  fn engine(&self) -> EngineSettings {
    EngineSettings {
      subject_max_chars:       self.subject_max_chars,
      reply_prefix:            self.reply_prefix.clone(),
      redirect_subject_prefix: self.redirect_subject_prefix.clone(),
      topic_link_template:     self.topic_link_template.clone(),
    }
  }

  fn actor(&self) -> MemberId { MemberId(self.moderator_id) }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("SPLICE"))
    .build()
    .context("failed to read config file")?;
  let cfg: CliConfig = settings
    .try_deserialize()
    .context("failed to deserialise CliConfig")?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let moderator = Moderator::new(store.clone())
    .with_settings(cfg.engine())
    .with_search_index(TracingSearchIndex)
    .with_moderation_log(store.clone())
    .with_notifier(TracingNotifier);

  match cli.command {
    Command::Split { topic, only, from, messages, subject, board } => {
      let selection = match (only, from) {
        (Some(id), _) => SplitSelection::Only(MessageId(id)),
        (None, Some(id)) => SplitSelection::From(MessageId(id)),
        (None, None) => SplitSelection::Selected(messages.into_iter().map(MessageId).collect()),
      };
      let request = SplitRequest {
        actor: cfg.actor(),
        topic_id: TopicId(topic),
        selection,
        subject,
        target_board: board.map(BoardId),
      };
      let outcome = moderator.split_topic(request).await.context("split failed")?;
      print_json(&outcome)?;
    }

    Command::Merge {
      topics,
      board,
      subject,
      subject_from,
      poll,
      enforce_subject,
      redirect,
      reason,
    } => {
      let subject = match (subject, subject_from) {
        (Some(text), _) => SubjectChoice::Custom(text),
        (None, Some(id)) => SubjectChoice::FromTopic(TopicId(id)),
        (None, None) => SubjectChoice::Survivor,
      };
      let defaults = RedirectOptions::default();
      let options = MergeOptions {
        target_board: board.map(BoardId),
        permitted_boards: None,
        subject,
        target_poll: poll.map(PollId),
        enforce_subject,
        create_redirects: redirect,
        redirect: RedirectOptions {
          reason:      reason.unwrap_or(defaults.reason),
          ttl_secs:    cfg.redirect_ttl_secs,
          poster_id:   cfg.actor(),
          poster_name: cfg.moderator_name.clone(),
        },
      };
      let request = MergeRequest {
        actor: cfg.actor(),
        topics: topics.into_iter().map(TopicId).collect(),
        options,
      };
      let outcome = moderator.merge_topics(request).await.context("merge failed")?;
      print_json(&outcome)?;
    }

    Command::Show { topic } => {
      let id = TopicId(topic);
      let row = store
        .get_topic(id)
        .await?
        .with_context(|| format!("topic {id} not found"))?;
      let messages = store.topic_messages(id).await?;
      print_json(&TopicView { topic: row, messages })?;
    }

    Command::Log => print_json(&store.moderation_log().await?)?,

    Command::SeedDemo => {
      let demo = seed_demo(&store).await.context("failed to seed demo data")?;
      print_json(&demo)?;
    }
  }

  Ok(())
}

// ─── Output ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct TopicView {
  topic:    splice_core::model::Topic,
  messages: Vec<splice_core::model::Message>,
}

#[derive(Serialize)]
struct Demo {
  board:  splice_core::model::Board,
  topics: Vec<DemoTopic>,
}

#[derive(Serialize)]
struct DemoTopic {
  topic:    TopicId,
  messages: Vec<MessageId>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Two topics on a fresh board: a discussion whose last reply awaits
/// approval, and a short follow-up thread.
async fn seed_demo(store: &SqliteStore) -> anyhow::Result<Demo> {
  let board = store.create_board("General Discussion").await?;

  let mut topics = Vec::new();
  for (subject, replies) in [
    ("Welcome to the forum", &[true, true, false][..]),
    ("Introductions", &[true][..]),
  ] {
    let first = store
      .post(NewPost::new(PostTarget::NewTopic(board.id), subject).by(MemberId(2), "alice"))
      .await?;
    let mut messages = vec![first.id];
    for approved in replies {
      let mut post = NewPost::new(PostTarget::Reply(first.topic_id), format!("Re: {subject}"))
        .by(MemberId(3), "bob");
      if !approved {
        post = post.unapproved();
      }
      messages.push(store.post(post).await?.id);
    }
    topics.push(DemoTopic { topic: first.topic_id, messages });
  }

  // Reload so the board carries its updated totals.
  let board = store.get_board(board.id).await?.unwrap_or(board);
  Ok(Demo { board, topics })
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
