//! SQL schema for the verbal SQLite store.
//!
//! Executed once at connection startup. Ownership runs one way: the owned
//! row carries the foreign key with `ON DELETE CASCADE`. Reference tables
//! (towns, adherents, humans, tags, ...) are never cascaded into.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Reference data ──────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS intercommunals (
    intercommunal_id TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    code             TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS towns (
    town_id          TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    code             TEXT NOT NULL,
    intercommunal_id TEXT REFERENCES intercommunals(intercommunal_id)
);

CREATE TABLE IF NOT EXISTS services (
    service_id TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    code       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS adherents (
    adherent_id      TEXT PRIMARY KEY,
    name             TEXT NOT NULL,
    firstname        TEXT,
    function         TEXT,
    city             TEXT,
    town_id          TEXT REFERENCES towns(town_id),
    intercommunal_id TEXT REFERENCES intercommunals(intercommunal_id),
    service_id       TEXT REFERENCES services(service_id)
);

CREATE TABLE IF NOT EXISTS agents (
    agent_id    TEXT PRIMARY KEY,
    adherent_id TEXT NOT NULL REFERENCES adherents(adherent_id),
    name        TEXT NOT NULL,
    firstname   TEXT,
    function    TEXT
);

CREATE TABLE IF NOT EXISTS humans (
    human_id  TEXT PRIMARY KEY,
    name      TEXT NOT NULL,
    firstname TEXT,
    kind      TEXT NOT NULL DEFAULT 'person'   -- 'person' | 'company'
);

CREATE TABLE IF NOT EXISTS tribunals (
    tribunal_id TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    code        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tags (
    tag_id   TEXT PRIMARY KEY,
    name     TEXT NOT NULL,
    category TEXT NOT NULL                     -- 'nature' | 'town'
);

CREATE TABLE IF NOT EXISTS natinfs (
    natinf_id     TEXT PRIMARY KEY,
    num           INTEGER NOT NULL,
    qualification TEXT NOT NULL
);

-- ── Minute aggregate ────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS minutes (
    minute_id             TEXT PRIMARY KEY,
    num                   TEXT NOT NULL UNIQUE,
    status                TEXT NOT NULL,
    origin                TEXT NOT NULL,
    adherent_id           TEXT NOT NULL REFERENCES adherents(adherent_id),
    agent_id              TEXT REFERENCES agents(agent_id),
    tribunal_id           TEXT REFERENCES tribunals(tribunal_id),
    tribunal_competent_id TEXT REFERENCES tribunals(tribunal_id),
    department            TEXT NOT NULL DEFAULT '',
    date_opening          TEXT NOT NULL,
    date_last_update      TEXT,
    date_complaint        TEXT,
    name_complaint        TEXT,
    is_closed             INTEGER NOT NULL DEFAULT 0,
    reporting             TEXT,
    created_at            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS closures (
    minute_id    TEXT PRIMARY KEY REFERENCES minutes(minute_id) ON DELETE CASCADE,
    status       TEXT NOT NULL,
    date_closing TEXT NOT NULL,
    observation  TEXT
);

CREATE TABLE IF NOT EXISTS plots (
    plot_id       TEXT PRIMARY KEY,
    minute_id     TEXT NOT NULL UNIQUE REFERENCES minutes(minute_id) ON DELETE CASCADE,
    town_id       TEXT NOT NULL REFERENCES towns(town_id),
    parcel        TEXT,
    parcel_clean  TEXT,
    address       TEXT,
    place         TEXT,
    is_risk_zone  INTEGER,
    risk          TEXT,
    latitude      REAL,
    longitude     REAL,
    location_from TEXT NOT NULL DEFAULT 'address'
);

CREATE TABLE IF NOT EXISTS minute_humans (
    minute_id TEXT NOT NULL REFERENCES minutes(minute_id) ON DELETE CASCADE,
    human_id  TEXT NOT NULL REFERENCES humans(human_id),
    position  INTEGER NOT NULL,
    PRIMARY KEY (minute_id, human_id)
);

-- Status history; append-only.
CREATE TABLE IF NOT EXISTS minute_stories (
    story_id    TEXT PRIMARY KEY,
    minute_id   TEXT NOT NULL REFERENCES minutes(minute_id) ON DELETE CASCADE,
    status      TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS updatings (
    updating_id TEXT PRIMARY KEY,
    minute_id   TEXT NOT NULL REFERENCES minutes(minute_id) ON DELETE CASCADE,
    num         TEXT NOT NULL,
    nature      TEXT,
    description TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS controls (
    control_id       TEXT PRIMARY KEY,
    minute_id        TEXT NOT NULL REFERENCES minutes(minute_id) ON DELETE CASCADE,
    updating_id      TEXT REFERENCES updatings(updating_id) ON DELETE CASCADE,
    agent_id         TEXT NOT NULL REFERENCES agents(agent_id),
    attendants       TEXT NOT NULL DEFAULT '[]',   -- JSON
    control_type     TEXT NOT NULL,                -- 'folder' | 'refresh'
    state            TEXT NOT NULL,
    date_postal      TEXT,
    date_sent        TEXT,
    date_notified    TEXT,
    date_returned    TEXT,
    date_contact     TEXT,
    date_control     TEXT,                         -- YYYY-MM-DD
    hour_control     TEXT,                         -- HH:MM:SS
    reason           TEXT,
    accepted         TEXT,
    summoned         INTEGER,
    courier_delivery TEXT,
    is_fenced        INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS control_humans (
    control_id TEXT NOT NULL REFERENCES controls(control_id) ON DELETE CASCADE,
    human_id   TEXT NOT NULL REFERENCES humans(human_id),
    role       TEXT NOT NULL CHECK (role IN ('minute', 'control')),
    position   INTEGER NOT NULL,
    PRIMARY KEY (control_id, human_id, role)
);

CREATE TABLE IF NOT EXISTS decisions (
    decision_id         TEXT PRIMARY KEY,
    minute_id           TEXT NOT NULL REFERENCES minutes(minute_id) ON DELETE CASCADE,
    tribunal_id         TEXT REFERENCES tribunals(tribunal_id),
    tribunal_commission TEXT,                      -- JSON
    appeal_commission   TEXT,                      -- JSON
    created_at          TEXT NOT NULL
);

-- The folder holds the link to its control; a control has at most one.
CREATE TABLE IF NOT EXISTS folders (
    folder_id             TEXT PRIMARY KEY,
    num                   TEXT NOT NULL,
    department            TEXT NOT NULL DEFAULT '',
    minute_id             TEXT NOT NULL REFERENCES minutes(minute_id) ON DELETE CASCADE,
    control_id            TEXT NOT NULL UNIQUE REFERENCES controls(control_id) ON DELETE CASCADE,
    folder_type           TEXT NOT NULL,
    nature                TEXT,
    reason_obstacle       TEXT,
    ascertainment         TEXT,
    details               TEXT,
    violation             TEXT,
    date_closure          TEXT,
    is_reread             INTEGER NOT NULL DEFAULT 0,
    folder_signed         TEXT,
    annexes               TEXT NOT NULL DEFAULT '[]',   -- JSON
    has_courier           INTEGER NOT NULL DEFAULT 0,
    courier_date_offender TEXT,
    courier_date_judicial TEXT,
    courier_date_ait      TEXT,
    created_at            TEXT NOT NULL,
    UNIQUE (department, num)
);

CREATE TABLE IF NOT EXISTS folder_tags (
    folder_id TEXT NOT NULL REFERENCES folders(folder_id) ON DELETE CASCADE,
    tag_id    TEXT NOT NULL REFERENCES tags(tag_id),
    PRIMARY KEY (folder_id, tag_id)
);

CREATE TABLE IF NOT EXISTS folder_natinfs (
    folder_id TEXT NOT NULL REFERENCES folders(folder_id) ON DELETE CASCADE,
    natinf_id TEXT NOT NULL REFERENCES natinfs(natinf_id),
    PRIMARY KEY (folder_id, natinf_id)
);

CREATE TABLE IF NOT EXISTS folder_humans (
    folder_id TEXT NOT NULL REFERENCES folders(folder_id) ON DELETE CASCADE,
    human_id  TEXT NOT NULL REFERENCES humans(human_id),
    role      TEXT NOT NULL CHECK (role IN ('minute', 'folder')),
    position  INTEGER NOT NULL,
    PRIMARY KEY (folder_id, human_id, role)
);

CREATE INDEX IF NOT EXISTS minutes_opening_idx   ON minutes(date_opening);
CREATE INDEX IF NOT EXISTS minutes_adherent_idx  ON minutes(adherent_id);
CREATE INDEX IF NOT EXISTS plots_town_idx        ON plots(town_id);
CREATE INDEX IF NOT EXISTS stories_minute_idx    ON minute_stories(minute_id);
CREATE INDEX IF NOT EXISTS updatings_minute_idx  ON updatings(minute_id);
CREATE INDEX IF NOT EXISTS controls_minute_idx   ON controls(minute_id);
CREATE INDEX IF NOT EXISTS controls_updating_idx ON controls(updating_id);
CREATE INDEX IF NOT EXISTS decisions_minute_idx  ON decisions(minute_id);
CREATE INDEX IF NOT EXISTS folders_minute_idx    ON folders(minute_id);

PRAGMA user_version = 1;
";
