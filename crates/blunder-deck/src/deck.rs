//! Anki package (.apkg) writer
//!
//! An .apkg is a zip holding `collection.anki2`, a SQLite database in the
//! schema-11 layout, and a `media` JSON map (empty here).

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use rand::Rng;
use rusqlite::{params, Connection};
use serde_json::{json, Value};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::cards::CardRecord;
use crate::error::DeckError;
use crate::template::{CardTemplate, MODEL_NAME, TEMPLATE_NAME};

/// Note type id; stable so re-imports update the same model.
pub const MODEL_ID: i64 = 1_684_207_102;

/// Index of the field Anki sorts and checksums by (Title).
const SORT_FIELD: usize = 1;

const SCHEMA: &str = "
CREATE TABLE col (
    id integer primary key,
    crt integer not null,
    mod integer not null,
    scm integer not null,
    ver integer not null,
    dty integer not null,
    usn integer not null,
    ls integer not null,
    conf text not null,
    models text not null,
    decks text not null,
    dconf text not null,
    tags text not null
);
CREATE TABLE notes (
    id integer primary key,
    guid text not null,
    mid integer not null,
    mod integer not null,
    usn integer not null,
    tags text not null,
    flds text not null,
    sfld integer not null,
    csum integer not null,
    flags integer not null,
    data text not null
);
CREATE TABLE cards (
    id integer primary key,
    nid integer not null,
    did integer not null,
    ord integer not null,
    mod integer not null,
    usn integer not null,
    type integer not null,
    queue integer not null,
    due integer not null,
    ivl integer not null,
    factor integer not null,
    reps integer not null,
    lapses integer not null,
    left integer not null,
    odue integer not null,
    odid integer not null,
    flags integer not null,
    data text not null
);
CREATE TABLE revlog (
    id integer primary key,
    cid integer not null,
    usn integer not null,
    ease integer not null,
    ivl integer not null,
    lastIvl integer not null,
    factor integer not null,
    time integer not null,
    type integer not null
);
CREATE TABLE graves (
    usn integer not null,
    oid integer not null,
    type integer not null
);
CREATE INDEX ix_notes_usn on notes (usn);
CREATE INDEX ix_cards_usn on cards (usn);
CREATE INDEX ix_revlog_usn on revlog (usn);
CREATE INDEX ix_cards_nid on cards (nid);
CREATE INDEX ix_cards_sched on cards (did, queue, due);
CREATE INDEX ix_revlog_cid on revlog (cid);
CREATE INDEX ix_notes_csum on notes (csum);
";

/// Target deck: name, id and the card template its notes use.
#[derive(Debug, Clone)]
pub struct Deck {
    pub id: i64,
    pub name: String,
    pub template: CardTemplate,
}

/// Random deck id in [2^30, 2^31).
pub fn random_deck_id() -> i64 {
    rand::thread_rng().gen_range(1 << 30..1 << 31)
}

/// Write `cards` as one note and one card each, in order, to `path`.
pub fn write_deck(path: &Path, deck: &Deck, cards: &[CardRecord]) -> Result<(), DeckError> {
    let scratch = tempfile::NamedTempFile::new()
        .map_err(|e| DeckError::write(path, format!("cannot create scratch database: {e}")))?;

    {
        let conn = Connection::open(scratch.path())?;
        build_collection(&conn, deck, cards)?;
    }
    let collection = fs::read(scratch.path())
        .map_err(|e| DeckError::write(path, format!("cannot read scratch database: {e}")))?;

    // Build the archive next to the destination and move it into place only
    // once complete, so a failed write never leaves a truncated deck
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| DeckError::write(path, e))?;
    let mut zip = ZipWriter::new(staged);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("collection.anki2", options)
        .map_err(|e| DeckError::write(path, e))?;
    zip.write_all(&collection)
        .map_err(|e| DeckError::write(path, e))?;
    zip.start_file("media", options)
        .map_err(|e| DeckError::write(path, e))?;
    zip.write_all(b"{}").map_err(|e| DeckError::write(path, e))?;
    let staged = zip.finish().map_err(|e| DeckError::write(path, e))?;
    staged
        .persist(path)
        .map_err(|e| DeckError::write(path, e.error))?;

    info!(path = %path.display(), deck = %deck.name, cards = cards.len(), "Deck written");
    Ok(())
}

fn build_collection(conn: &Connection, deck: &Deck, cards: &[CardRecord]) -> Result<(), DeckError> {
    conn.execute_batch(SCHEMA)?;

    let now = Utc::now();
    let now_ms = now.timestamp_millis();
    let now_secs = now.timestamp();
    let day_start = now_secs - now_secs % 86_400;

    conn.execute(
        "INSERT INTO col VALUES (1, ?1, ?2, ?3, 11, 0, 0, 0, ?4, ?5, ?6, ?7, '{}')",
        params![
            day_start,
            now_ms,
            now_ms,
            collection_conf(deck.id).to_string(),
            json!({ (MODEL_ID.to_string()): model(deck, now_secs) }).to_string(),
            decks(deck, now_secs).to_string(),
            deck_conf().to_string(),
        ],
    )?;

    let mut note_stmt = conn.prepare(
        "INSERT INTO notes VALUES (?1, ?2, ?3, ?4, -1, '', ?5, ?6, ?7, 0, '')",
    )?;
    let mut card_stmt = conn.prepare(
        "INSERT INTO cards VALUES (?1, ?2, ?3, 0, ?4, -1, 0, 0, ?5, 0, 0, 0, 0, 0, 0, 0, 0, '')",
    )?;

    for (i, card) in cards.iter().enumerate() {
        let fields = card.fields();
        let sort_field = fields.get(SORT_FIELD).cloned().unwrap_or_default();
        let flds = fields
            .iter()
            .map(|f| escape_html(f))
            .collect::<Vec<_>>()
            .join("\x1f");

        let id = now_ms + i as i64;
        note_stmt.execute(params![
            id,
            card.id.to_string(),
            MODEL_ID,
            now_secs,
            flds,
            sort_field,
            field_checksum(&sort_field),
        ])?;
        card_stmt.execute(params![id, id, deck.id, now_secs, i as i64 + 1])?;
        debug!(note = id, title = %card.title, "Note added");
    }

    Ok(())
}

/// First 8 hex digits of the SHA-1 of the field, as Anki's duplicate check
/// expects.
fn field_checksum(field: &str) -> i64 {
    let digest = sha1_smol::Sha1::from(field).digest().to_string();
    i64::from_str_radix(&digest[..8], 16).unwrap_or(0)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn model(deck: &Deck, now_secs: i64) -> Value {
    let names = CardRecord::field_names();
    let flds: Vec<Value> = names
        .iter()
        .enumerate()
        .map(|(ord, name)| {
            json!({
                "name": name,
                "ord": ord,
                "font": "Arial",
                "media": [],
                "rtl": false,
                "size": 20,
                "sticky": false,
            })
        })
        .collect();

    // A card is generated when any field shown on the front is non-empty
    let mut required: Vec<usize> = names
        .iter()
        .enumerate()
        .filter(|(_, name)| deck.template.front.contains(&format!("{{{{{name}}}}}")))
        .map(|(ord, _)| ord)
        .collect();
    if required.is_empty() {
        required.push(0);
    }

    json!({
        "id": MODEL_ID,
        "name": MODEL_NAME,
        "type": 0,
        "mod": now_secs,
        "usn": -1,
        "sortf": SORT_FIELD,
        "did": deck.id,
        "tags": [],
        "vers": [],
        "flds": flds,
        "tmpls": [{
            "name": TEMPLATE_NAME,
            "ord": 0,
            "qfmt": deck.template.front,
            "afmt": deck.template.back,
            "bqfmt": "",
            "bafmt": "",
            "did": null,
        }],
        "css": deck.template.css,
        "latexPre": "\\documentclass[12pt]{article}\n\\special{papersize=3in,5in}\n\\usepackage[utf8]{inputenc}\n\\usepackage{amssymb,amsmath}\n\\pagestyle{empty}\n\\setlength{\\parindent}{0in}\n\\begin{document}\n",
        "latexPost": "\\end{document}",
        "req": [[0, "any", required]],
    })
}

fn deck_entry(id: i64, name: &str, now_secs: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "desc": "",
        "mod": now_secs,
        "usn": -1,
        "collapsed": false,
        "conf": 1,
        "dyn": 0,
        "extendNew": 10,
        "extendRev": 50,
        "newToday": [0, 0],
        "revToday": [0, 0],
        "lrnToday": [0, 0],
        "timeToday": [0, 0],
    })
}

fn decks(deck: &Deck, now_secs: i64) -> Value {
    json!({
        "1": deck_entry(1, "Default", now_secs),
        (deck.id.to_string()): deck_entry(deck.id, &deck.name, now_secs),
    })
}

fn deck_conf() -> Value {
    json!({
        "1": {
            "id": 1,
            "name": "Default",
            "mod": 0,
            "usn": 0,
            "autoplay": true,
            "replayq": true,
            "timer": 0,
            "maxTaken": 60,
            "new": {
                "bury": true,
                "delays": [1, 10],
                "initialFactor": 2500,
                "ints": [1, 4, 7],
                "order": 1,
                "perDay": 20,
                "separate": true,
            },
            "lapse": {
                "delays": [10],
                "leechAction": 0,
                "leechFails": 8,
                "minInt": 1,
                "mult": 0,
            },
            "rev": {
                "bury": true,
                "ease4": 1.3,
                "fuzz": 0.05,
                "ivlFct": 1,
                "maxIvl": 36500,
                "minSpace": 1,
                "perDay": 100,
            },
        }
    })
}

fn collection_conf(deck_id: i64) -> Value {
    json!({
        "activeDecks": [deck_id],
        "curDeck": deck_id,
        "curModel": MODEL_ID.to_string(),
        "newSpread": 0,
        "collapseTime": 1200,
        "timeLim": 0,
        "estTimes": true,
        "dueCounts": true,
        "nextPos": 1,
        "sortType": "noteFld",
        "sortBackwards": false,
        "addToCur": true,
    })
}
