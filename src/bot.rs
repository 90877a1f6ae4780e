//! Command dispatch: turns inbound chat messages into store operations and
//! reply texts. Transport-agnostic; see `telegram` for the network side.

use crate::error::{Result, ScoreError};
use crate::model::{build_records, MonotonicClock};
use crate::parse::{check_line_len, check_message_len, parse_line};
use crate::stats::{aggregate, format_table, Filter};
use crate::store::{BackendConfig, ScoreStore};

pub const HELP_TEXT: &str = "Usage:
lu linus 9 10 - add a new duel score
lu linus 9-10 - same, also 9:10 or 9/10
/stats - all aggregate statistics
/stats lu - Lu's statistics
/stats lu linus - Lu-vs-Linus statistics
/s - short for /stats
/clear - back up and delete all scores
/start - (re)connect the score table";

/// A message as delivered by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Command { name: String, args: Vec<String> },
    Text(String),
}

impl Inbound {
    /// Classify raw message text. `/name@botname arg ...` is a command,
    /// anything else is match input.
    pub fn parse(text: &str) -> Inbound {
        let Some(rest) = text.trim_start().strip_prefix('/') else {
            return Inbound::Text(text.to_string());
        };

        let mut words = rest.split_whitespace();
        let head = words.next().unwrap_or("");
        let name = head.split('@').next().unwrap_or("").to_lowercase();
        let args = words.map(str::to_lowercase).collect();
        Inbound::Command { name, args }
    }
}

/// Attaches a fresh store handle
pub type StoreOpener = Box<dyn Fn() -> Result<Box<dyn ScoreStore>>>;

/// Message handler holding the store handle
pub struct Bot {
    open: StoreOpener,
    store: Option<Box<dyn ScoreStore>>,
    clock: MonotonicClock,
}

impl Bot {
    /// The store is attached lazily on first use or by `/start`
    pub fn new(backend: BackendConfig) -> Self {
        Self::with_opener(Box::new(move || backend.open()))
    }

    pub fn with_opener(open: StoreOpener) -> Self {
        Self {
            open,
            store: None,
            clock: MonotonicClock::new(),
        }
    }

    /// Handle one message to completion and return the replies to send
    pub fn handle(&mut self, inbound: &Inbound) -> Vec<String> {
        match inbound {
            Inbound::Text(text) => self.record(text),
            Inbound::Command { name, args } => {
                let reply = match name.as_str() {
                    "start" => self.start(),
                    "help" => Ok(HELP_TEXT.to_string()),
                    "stats" | "s" => self.stats(args),
                    "clear" | "delete" => self.clear(),
                    other => Ok(format!("Unknown command /{}. Try /help.", other)),
                };
                vec![reply.unwrap_or_else(|e| describe(&e))]
            }
        }
    }

    fn start(&mut self) -> Result<String> {
        let store = (self.open)()?;
        let reply = format!("Score table initialized ({}).", store.name());
        log::info!("attached {}", store.name());
        self.store = Some(store);
        Ok(reply)
    }

    fn stats(&mut self, args: &[String]) -> Result<String> {
        let filter = Filter::from_args(args)?;
        let records = self.with_store(|store| store.read())?;
        let groups = aggregate(&records, &filter)?;
        if groups.is_empty() {
            return Ok("No matches found.".to_string());
        }
        Ok(format_table(&groups))
    }

    fn clear(&mut self) -> Result<String> {
        let backup = self.with_store(|store| store.clear())?;
        Ok(format!("All scores deleted (backup: {}).", backup))
    }

    /// Parse match lines and store each valid one as soon as it is parsed.
    ///
    /// A bad line is reported and skipped; an overlong line or a store
    /// failure stops the rest of the message.
    fn record(&mut self, text: &str) -> Vec<String> {
        let text = text.to_lowercase();
        if let Err(e) = check_message_len(&text) {
            return vec![describe(&e)];
        }

        let mut replies = Vec::new();
        let mut saved = 0;
        for line in text.split('\n') {
            if let Err(e) = check_line_len(line) {
                replies.push(describe(&e));
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            let parsed = match parse_line(line) {
                Ok(parsed) => parsed,
                Err(e) => {
                    replies.push(describe(&e));
                    continue;
                }
            };

            let rows = build_records(&parsed, self.clock.now());
            match self.with_store(|store| store.append(&rows)) {
                Ok(()) => {
                    log::info!("recorded {}", rows[0]);
                    saved += 1;
                }
                Err(e) => {
                    replies.push(describe(&e));
                    break;
                }
            }
        }

        if saved > 0 {
            let noun = if saved == 1 { "match" } else { "matches" };
            replies.push(format!("Recorded {} {}.", saved, noun));
        }
        replies
    }

    /// Run `op` against the store, attaching it first if needed. If the
    /// backend reports itself unavailable, re-open it once and retry.
    fn with_store<T>(&mut self, op: impl Fn(&dyn ScoreStore) -> Result<T>) -> Result<T> {
        if let Some(store) = &self.store {
            match op(store.as_ref()) {
                Err(ScoreError::BackendUnavailable(reason)) => {
                    log::warn!("{} unavailable ({}), re-initializing", store.name(), reason);
                }
                result => return result,
            }
        }

        let store = (self.open)()?;
        let result = op(store.as_ref());
        self.store = Some(store);
        result
    }
}

/// Reply text for a failed operation
fn describe(err: &ScoreError) -> String {
    match err {
        e if e.is_user_error() => e.to_string(),
        ScoreError::BackendUnavailable(_) => err.to_string(),
        e => {
            log::error!("{}", e);
            "Internal error, see the bot log.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MatchRecord, ParsedMatch};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn records(bot: &mut Bot) -> Result<Vec<MatchRecord>> {
        bot.with_store(|store| store.read())
    }

    /// Counts opens and reads; the next `failures` reads report the
    /// backend as unavailable
    #[derive(Default)]
    struct Flaky {
        opens: u32,
        reads: u32,
        failures: u32,
    }

    struct FlakyStore(Rc<RefCell<Flaky>>);

    impl ScoreStore for FlakyStore {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn read(&self) -> Result<Vec<MatchRecord>> {
            let mut state = self.0.borrow_mut();
            state.reads += 1;
            if state.failures > 0 {
                state.failures -= 1;
                return Err(ScoreError::BackendUnavailable("connection reset".into()));
            }
            let parsed = ParsedMatch {
                name_a: "lu".into(),
                name_b: "linus".into(),
                points_a: 9,
                points_b: 10,
            };
            Ok(build_records(&parsed, 1).to_vec())
        }

        fn append(&self, _records: &[MatchRecord]) -> Result<()> {
            Ok(())
        }

        fn clear(&self) -> Result<String> {
            Err(ScoreError::NoData)
        }
    }

    fn flaky_bot() -> (Rc<RefCell<Flaky>>, Bot) {
        let state = Rc::new(RefCell::new(Flaky::default()));
        let shared = Rc::clone(&state);
        let bot = Bot::with_opener(Box::new(move || {
            shared.borrow_mut().opens += 1;
            Ok(Box::new(FlakyStore(Rc::clone(&shared))) as Box<dyn ScoreStore>)
        }));
        (state, bot)
    }

    fn bot() -> (TempDir, Bot) {
        let dir = tempfile::tempdir().unwrap();
        let backend = BackendConfig::Local {
            path: dir.path().join("data").join("scores.csv"),
        };
        (dir, Bot::new(backend))
    }

    fn text(s: &str) -> Inbound {
        Inbound::Text(s.to_string())
    }

    fn command(s: &str) -> Inbound {
        Inbound::parse(s)
    }

    #[test]
    fn test_inbound_parse() {
        assert_eq!(
            Inbound::parse("/stats@pompf_bot Lu  Max"),
            Inbound::Command {
                name: "stats".into(),
                args: vec!["lu".into(), "max".into()]
            }
        );
        assert_eq!(
            Inbound::parse("/S"),
            Inbound::Command { name: "s".into(), args: vec![] }
        );
        assert_eq!(Inbound::parse("lu max 10 4"), text("lu max 10 4"));
    }

    #[test]
    fn test_record_and_query() {
        let (_dir, mut bot) = bot();
        assert_eq!(bot.handle(&text("Lu Linus 9 10")), vec!["Recorded 1 match."]);

        let stored = records(&mut bot).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].player, "linus");
        assert_eq!(stored[1].player_points, 10);

        let reply = bot.handle(&command("/stats lu"));
        assert_eq!(reply, vec!["lu        linus      9:10\t47%"]);
    }

    #[test]
    fn test_pair_query() {
        let (_dir, mut bot) = bot();
        bot.handle(&text("lu max 10-4\nlu linus 3:1"));
        let reply = bot.handle(&command("/s max lu"));
        assert_eq!(reply, vec!["max       lu         4:10\t29%"]);
    }

    #[test]
    fn test_multi_line_message() {
        let (_dir, mut bot) = bot();
        let replies = bot.handle(&text("lu max 10 4\nlu lu 1 2\n\nmax linus 3/2\n"));
        assert_eq!(replies.len(), 2);
        assert!(replies[0].starts_with("Names must be unequal"));
        assert_eq!(replies[1], "Recorded 2 matches.");
        assert_eq!(records(&mut bot).unwrap().len(), 4);
    }

    #[test]
    fn test_long_line_aborts_rest_of_message() {
        let (_dir, mut bot) = bot();
        let message = format!("lu max 10 4\n{}\nlu linus 1 2", "x".repeat(31));
        let replies = bot.handle(&text(&message));
        assert_eq!(replies, vec!["Error: Line longer than 30.", "Recorded 1 match."]);
        assert_eq!(records(&mut bot).unwrap().len(), 2);
    }

    #[test]
    fn test_long_line_leaves_store_unchanged() {
        let (_dir, mut bot) = bot();
        let replies = bot.handle(&text(&"a".repeat(40)));
        assert_eq!(replies, vec!["Error: Line longer than 30."]);
        assert!(records(&mut bot).unwrap().is_empty());
    }

    #[test]
    fn test_long_message() {
        let (_dir, mut bot) = bot();
        let replies = bot.handle(&text(&"a b 1 2\n".repeat(4000)));
        assert_eq!(replies, vec!["Error: Message longer than 25000."]);
        assert!(records(&mut bot).unwrap().is_empty());
    }

    #[test]
    fn test_stats_on_empty_store() {
        let (_dir, mut bot) = bot();
        assert_eq!(bot.handle(&command("/stats")), vec!["No data stored."]);
    }

    #[test]
    fn test_stats_unknown_player() {
        let (_dir, mut bot) = bot();
        bot.handle(&text("lu max 10 4"));
        assert_eq!(bot.handle(&command("/stats nobody")), vec!["No matches found."]);
    }

    #[test]
    fn test_stats_too_many_names() {
        let (_dir, mut bot) = bot();
        bot.handle(&text("lu max 10 4"));
        let reply = bot.handle(&command("/stats a b c"));
        assert!(reply[0].starts_with("Invalid command"));
    }

    #[test]
    fn test_bad_input_is_reported() {
        let (_dir, mut bot) = bot();
        assert_eq!(bot.handle(&text("hello")), vec!["Bad input format: hello"]);
        assert_eq!(bot.handle(&text("a b 9-10-1")), vec!["Bad score format: 9-10-1"]);
    }

    #[test]
    fn test_clear_backs_up() {
        let (dir, mut bot) = bot();
        bot.handle(&text("lu max 10 4"));
        let reply = bot.handle(&command("/delete"));
        assert!(reply[0].starts_with("All scores deleted"));
        assert!(records(&mut bot).unwrap().is_empty());

        let backups = std::fs::read_dir(dir.path().join("data")).unwrap().count();
        assert_eq!(backups, 1);
        assert_eq!(bot.handle(&command("/clear")), vec!["No data stored."]);
    }

    #[test]
    fn test_start_and_help() {
        let (_dir, mut bot) = bot();
        assert_eq!(
            bot.handle(&command("/start")),
            vec!["Score table initialized (local file)."]
        );
        assert_eq!(bot.handle(&command("/help")), vec![HELP_TEXT]);
        assert!(bot.handle(&command("/nope"))[0].starts_with("Unknown command /nope"));
    }

    #[test]
    fn test_unavailable_store_is_reopened_once() {
        let (state, mut bot) = flaky_bot();
        bot.handle(&command("/start"));
        state.borrow_mut().failures = 1;

        let reply = bot.handle(&command("/stats lu"));
        assert_eq!(reply, vec!["lu        linus      9:10\t47%"]);
        let state = state.borrow();
        assert_eq!(state.opens, 2);
        assert_eq!(state.reads, 2);
    }

    #[test]
    fn test_second_failure_reaches_user() {
        let (state, mut bot) = flaky_bot();
        bot.handle(&command("/start"));
        state.borrow_mut().failures = 2;

        let reply = bot.handle(&command("/stats"));
        assert_eq!(reply, vec!["Store unavailable: connection reset"]);
        let state = state.borrow();
        assert_eq!(state.opens, 2);
        assert_eq!(state.reads, 2);
    }

    #[test]
    fn test_healthy_store_is_not_reopened() {
        let (state, mut bot) = flaky_bot();
        bot.handle(&command("/stats"));
        bot.handle(&command("/stats lu"));
        assert_eq!(state.borrow().opens, 1);
        assert_eq!(state.borrow().reads, 2);
    }

    #[test]
    fn test_unavailable_backend_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let backend = BackendConfig::Sheet(crate::store::SheetConfig {
            sheet_id: "abc".into(),
            range: "Data!A1:E".into(),
            oauth: crate::auth::OAuthFiles {
                client_secrets: dir.path().join("credentials.json"),
                token_file: dir.path().join("token.json"),
            },
        });
        let mut bot = Bot::new(backend);
        let reply = bot.handle(&command("/stats"));
        assert!(reply[0].starts_with("Store unavailable"));
    }
}
