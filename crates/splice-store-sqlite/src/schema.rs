//! SQL schema for the splice SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS boards (
    board_id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name              TEXT    NOT NULL,
    num_topics        INTEGER NOT NULL DEFAULT 0,
    unapproved_topics INTEGER NOT NULL DEFAULT 0,
    num_posts         INTEGER NOT NULL DEFAULT 0,
    unapproved_posts  INTEGER NOT NULL DEFAULT 0
);

-- AUTOINCREMENT keeps ids strictly ascending, so a lower topic id always
-- means an older topic.
CREATE TABLE IF NOT EXISTS topics (
    topic_id            INTEGER PRIMARY KEY AUTOINCREMENT,
    board_id            INTEGER NOT NULL REFERENCES boards(board_id),
    subject             TEXT    NOT NULL,
    first_msg_id        INTEGER NOT NULL,
    last_msg_id         INTEGER NOT NULL,
    num_replies         INTEGER NOT NULL DEFAULT 0,
    unapproved_posts    INTEGER NOT NULL DEFAULT 0,
    approved            INTEGER NOT NULL DEFAULT 1,
    is_sticky           INTEGER NOT NULL DEFAULT 0,
    is_locked           INTEGER NOT NULL DEFAULT 0,
    num_views           INTEGER NOT NULL DEFAULT 0,
    poll_id             INTEGER,
    redirect_topic_id   INTEGER,            -- set on redirect stubs only
    redirect_expires_at TEXT,               -- ISO 8601 UTC; NULL = never
    created_at          TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    msg_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    topic_id    INTEGER NOT NULL REFERENCES topics(topic_id),
    board_id    INTEGER NOT NULL REFERENCES boards(board_id),
    approved    INTEGER NOT NULL DEFAULT 1,
    poster_id   INTEGER NOT NULL,
    poster_name TEXT    NOT NULL,
    posted_at   TEXT    NOT NULL,
    subject     TEXT    NOT NULL,
    body        TEXT    NOT NULL,
    icon        TEXT    NOT NULL DEFAULT 'xx'
);

CREATE TABLE IF NOT EXISTS polls (
    poll_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    question TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS poll_choices (
    poll_id   INTEGER NOT NULL REFERENCES polls(poll_id),
    choice_id INTEGER NOT NULL,
    label     TEXT    NOT NULL,
    votes     INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (poll_id, choice_id)
);

CREATE TABLE IF NOT EXISTS log_polls (
    poll_id   INTEGER NOT NULL REFERENCES polls(poll_id),
    member_id INTEGER NOT NULL,
    choice_id INTEGER NOT NULL,
    PRIMARY KEY (poll_id, member_id, choice_id)
);

-- Topic-level rows have topic_id set; board-level rows have board_id set.
CREATE TABLE IF NOT EXISTS log_notify (
    member_id INTEGER NOT NULL,
    topic_id  INTEGER,
    board_id  INTEGER,
    sent      INTEGER NOT NULL DEFAULT 0
);
CREATE UNIQUE INDEX IF NOT EXISTS log_notify_topic_idx
    ON log_notify(member_id, topic_id) WHERE topic_id IS NOT NULL;
CREATE UNIQUE INDEX IF NOT EXISTS log_notify_board_idx
    ON log_notify(member_id, board_id) WHERE board_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS log_topics (
    member_id        INTEGER NOT NULL,
    topic_id         INTEGER NOT NULL,
    last_read_msg_id INTEGER NOT NULL,
    unwatched        INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (member_id, topic_id)
);

CREATE TABLE IF NOT EXISTS log_reported (
    report_id INTEGER PRIMARY KEY AUTOINCREMENT,
    msg_id    INTEGER NOT NULL,
    topic_id  INTEGER NOT NULL,
    board_id  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS calendar (
    event_id INTEGER PRIMARY KEY AUTOINCREMENT,
    title    TEXT    NOT NULL,
    topic_id INTEGER NOT NULL,
    board_id INTEGER NOT NULL
);

-- Append-only; only topic pointers of deleted merge sources are rewritten.
CREATE TABLE IF NOT EXISTS log_actions (
    action_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    action       TEXT    NOT NULL,   -- 'split' | 'merge'
    member_id    INTEGER NOT NULL,
    topic_id     INTEGER NOT NULL,
    board_id     INTEGER NOT NULL,
    new_topic_id INTEGER,
    logged_at    TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS search_subjects (
    word     TEXT    NOT NULL,
    topic_id INTEGER NOT NULL,
    PRIMARY KEY (word, topic_id)
);

CREATE INDEX IF NOT EXISTS messages_topic_idx     ON messages(topic_id);
CREATE INDEX IF NOT EXISTS topics_board_idx       ON topics(board_id);
CREATE INDEX IF NOT EXISTS log_reported_topic_idx ON log_reported(topic_id);
CREATE INDEX IF NOT EXISTS calendar_topic_idx     ON calendar(topic_id);
CREATE INDEX IF NOT EXISTS search_subjects_topic  ON search_subjects(topic_id);

PRAGMA user_version = 1;
";
