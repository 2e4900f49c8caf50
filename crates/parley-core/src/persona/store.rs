use std::path::PathBuf;

use tracing::debug;

use super::card::read_card;
use super::{Persona, PersonaSummary};

/// Directory-backed persona catalog.
///
/// The directory is rescanned on every call, so edits to card files show up
/// on the next request without a restart.
#[derive(Debug, Clone)]
pub struct PersonaStore {
    root: PathBuf,
}

impl PersonaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// All usable personas, ordered by file name.
    ///
    /// A missing directory yields an empty list. Cards that fail to parse or
    /// lack a system prompt are skipped.
    pub fn list(&self) -> Vec<Persona> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(root = %self.root.display(), error = %e, "persona directory unavailable");
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        paths
            .iter()
            .filter_map(|path| match read_card(path) {
                Ok(persona) => Some(persona),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping persona card");
                    None
                }
            })
            .collect()
    }

    /// Public summaries of [`list`](Self::list).
    pub fn summaries(&self) -> Vec<PersonaSummary> {
        self.list().into_iter().map(PersonaSummary::from).collect()
    }

    /// Look up a persona by id. Unknown ids return `None`.
    pub fn get(&self, id: &str) -> Option<Persona> {
        self.list().into_iter().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::Path;
    use tracing_test::traced_test;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn missing_directory_is_empty() {
        let store = PersonaStore::new("/no/such/persona/dir");
        assert!(store.list().is_empty());
        assert!(store.get("anyone").is_none());
    }

    #[test]
    #[traced_test]
    fn broken_cards_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a_good.json", r#"{"id":"good","system_prompt":"ok"}"#);
        write(dir.path(), "b_broken.json", "{ nope");
        write(dir.path(), "c_silent.json", r#"{"id":"silent","description":"no prompt"}"#);
        write(dir.path(), "notes.txt", r#"{"id":"txt","system_prompt":"ignored"}"#);

        let list = PersonaStore::new(dir.path()).list();
        let ids: Vec<_> = list.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["good"]);
        assert!(logs_contain("skipping persona card"));
    }

    #[test]
    fn list_never_contains_empty_prompts() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "one.json", r#"{"system_prompt":""}"#);
        write(dir.path(), "two.json", r#"{"system":"two"}"#);
        write(dir.path(), "three.json", r#"{"prompt":"three"}"#);

        let list = PersonaStore::new(dir.path()).list();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|p| !p.system_prompt.is_empty()));
        // ordered by file name
        assert_eq!(list[0].id, "three");
        assert_eq!(list[1].id, "two");
    }

    #[test]
    fn get_finds_by_id_and_misses_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "ideas_guy.json",
            r#"{"id":"ideas_guy","name":"Ideas Guy","prompt":"Pitch everything."}"#,
        );
        let store = PersonaStore::new(dir.path());

        let p = store.get("ideas_guy").expect("persona present");
        assert_eq!(p.system_prompt, "Pitch everything.");
        assert!(store.get("nobody").is_none());
    }

    #[test]
    fn edits_are_visible_without_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersonaStore::new(dir.path());
        assert!(store.list().is_empty());

        write(dir.path(), "late.json", r#"{"system":"arrived"}"#);
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn summaries_hide_prompt_and_greeting() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "p.json",
            r#"{"id":"p","name":"P","system":"secret","greeting":"hi","avatar":"/p.png"}"#,
        );
        let summaries = PersonaStore::new(dir.path()).summaries();
        let json = serde_json::to_value(&summaries).unwrap();
        assert_eq!(json[0]["id"], "p");
        assert_eq!(json[0]["avatar"], "/p.png");
        assert!(json[0].get("system_prompt").is_none());
        assert!(json[0].get("greeting").is_none());
    }
}
