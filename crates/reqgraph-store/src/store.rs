//! Per-project cached element store with lock-scoped mutation.
//!
//! Each project id maps to one document at `<root>/<id>.json` and one cached
//! [`Graph`] behind its own `RwLock`. Writers for different projects only
//! share the project map while a project is first loaded; readers of a
//! project never observe a graph mid-mutation.

use crate::document::{
    DocumentError, TMP_MARKER, decode_graph, encode_graph, read_document, write_document,
};
use crate::graph::Graph;
use chrono::Utc;
use regex::Regex;
use reqgraph_schema::Schema;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

const DOCUMENT_EXTENSION: &str = "json";

/// Errors raised while loading, listing or persisting projects.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid project id `{0}`: expected [A-Za-z0-9][A-Za-z0-9._-]*")]
    InvalidProjectId(String),

    #[error("project {project}: {source}")]
    Document {
        project: String,
        #[source]
        source: DocumentError,
    },

    #[error("failed to list projects in {path}: {message}")]
    Listing { path: String, message: String },
}

/// Failure of one lock-scoped mutation: either the store or the mutator.
#[derive(Debug)]
pub enum StoreMutationError<E> {
    Store(StoreError),
    Mutation(E),
}

impl<E: Display> Display for StoreMutationError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Mutation(err) => write!(f, "{err}"),
        }
    }
}

impl<E> StdError for StoreMutationError<E> where
    E: Display + std::fmt::Debug + StdError + 'static
{
}

fn project_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("project id regex must compile")
    })
}

/// Reject project ids that do not map to a plain file name.
pub fn validate_project_id(project: &str) -> Result<(), StoreError> {
    if project_id_re().is_match(project) && !project.contains(TMP_MARKER) {
        Ok(())
    } else {
        Err(StoreError::InvalidProjectId(project.to_string()))
    }
}

type ProjectSlot = Arc<RwLock<Graph>>;

/// File-backed store holding one cached graph per project.
#[derive(Debug)]
pub struct ElementStore {
    root: PathBuf,
    schema: Arc<Schema>,
    projects: Mutex<HashMap<String, ProjectSlot>>,
}

impl ElementStore {
    pub fn new(root: impl Into<PathBuf>, schema: Arc<Schema>) -> Self {
        Self {
            root: root.into(),
            schema,
            projects: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Conventional document path of `project`.
    pub fn document_path(&self, project: &str) -> PathBuf {
        self.root.join(format!("{project}.{DOCUMENT_EXTENSION}"))
    }

    /// Snapshot of a project's graph, creating the project durably if it
    /// does not exist yet.
    pub fn load_project(&self, project: &str) -> Result<Graph, StoreError> {
        self.read_project(project, Graph::clone)
    }

    /// Run `reader` against the cached graph under a read guard.
    pub fn read_project<T>(
        &self,
        project: &str,
        reader: impl FnOnce(&Graph) -> T,
    ) -> Result<T, StoreError> {
        let slot = self.slot(project)?;
        let graph = slot.read().unwrap_or_else(PoisonError::into_inner);
        Ok(reader(&graph))
    }

    /// Replace a project's graph and write it durably.
    pub fn save_project(&self, project: &str, graph: &Graph) -> Result<(), StoreError> {
        let slot = self.slot(project)?;
        let mut cached = slot.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(project, graph)?;
        *cached = graph.clone();
        Ok(())
    }

    /// Execute one lock-scoped mutation against a project.
    ///
    /// The mutator works on a copy of the cached graph and returns
    /// `(value, changed)`:
    /// - `value` is returned to the caller
    /// - `changed=true` writes the copy durably, then publishes it to the
    ///   cache before the write guard is released.
    ///
    /// A failing mutator or write leaves the cached graph untouched.
    pub fn mutate_project<T, E, F>(
        &self,
        project: &str,
        mutator: F,
    ) -> Result<T, StoreMutationError<E>>
    where
        F: FnOnce(&mut Graph) -> Result<(T, bool), E>,
    {
        let slot = self.slot(project).map_err(StoreMutationError::Store)?;
        let mut cached = slot.write().unwrap_or_else(PoisonError::into_inner);
        let mut working = cached.clone();
        let (value, changed) = mutator(&mut working).map_err(StoreMutationError::Mutation)?;
        if changed {
            self.persist(project, &working)
                .map_err(StoreMutationError::Store)?;
            *cached = working;
        }
        Ok(value)
    }

    /// Project ids with a document under the store root, sorted.
    pub fn list_projects(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(StoreError::Listing {
                    path: self.root.display().to_string(),
                    message: err.to_string(),
                });
            }
        };

        let mut projects = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| StoreError::Listing {
                path: self.root.display().to_string(),
                message: err.to_string(),
            })?;
            let path = entry.path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(DOCUMENT_EXTENSION)
            {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str())
                && validate_project_id(stem).is_ok()
            {
                projects.push(stem.to_string());
            }
        }
        projects.sort();
        Ok(projects)
    }

    /// Reload the cached graph of `project` from disk in place.
    ///
    /// Waits for the project's write guard, so an in-flight mutation lands
    /// before the reload and later callers keep sharing the same lock.
    /// Returns whether the project was cached.
    pub fn invalidate_cache(&self, project: &str) -> Result<bool, StoreError> {
        let slot = {
            let projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
            projects.get(project).map(Arc::clone)
        };
        let Some(slot) = slot else {
            return Ok(false);
        };
        let mut cached = slot.write().unwrap_or_else(PoisonError::into_inner);
        *cached = self.read_or_create(project)?;
        tracing::debug!(project, elements = cached.len(), "project cache reloaded");
        Ok(true)
    }

    fn slot(&self, project: &str) -> Result<ProjectSlot, StoreError> {
        validate_project_id(project)?;
        // Held across the first load so a missing project is created once.
        let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = projects.get(project) {
            return Ok(Arc::clone(slot));
        }
        let slot = Arc::new(RwLock::new(self.read_or_create(project)?));
        projects.insert(project.to_string(), Arc::clone(&slot));
        Ok(slot)
    }

    fn read_or_create(&self, project: &str) -> Result<Graph, StoreError> {
        let path = self.document_path(project);
        let document_error = |source| StoreError::Document {
            project: project.to_string(),
            source,
        };

        if path.exists() {
            let document = read_document(&path).map_err(document_error)?;
            let graph = decode_graph(&document, &self.schema).map_err(document_error)?;
            tracing::debug!(project, elements = graph.len(), "project loaded");
            return Ok(graph);
        }

        let graph = Graph::new();
        self.persist(project, &graph)?;
        tracing::info!(project, path = %path.display(), "created empty project");
        Ok(graph)
    }

    fn persist(&self, project: &str, graph: &Graph) -> Result<(), StoreError> {
        let path = self.document_path(project);
        let mut document = encode_graph(project, graph);
        document.saved_at = Some(Utc::now());
        write_document(&path, &document).map_err(|source| StoreError::Document {
            project: project.to_string(),
            source,
        })?;
        tracing::debug!(project, elements = graph.len(), "project written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::graph::GraphError;
    use std::sync::{Barrier, mpsc};
    use std::thread;
    use std::time::Duration;

    fn store(root: &Path) -> ElementStore {
        let schema = Schema::bundled().expect("bundled schema must load");
        ElementStore::new(root, Arc::new(schema))
    }

    #[test]
    fn loading_missing_project_creates_it_durably() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());

        let graph = store.load_project("alpha").expect("loads");
        assert!(graph.is_empty());
        assert!(store.document_path("alpha").exists());
        assert_eq!(store.list_projects().expect("lists"), vec!["alpha".to_string()]);
    }

    #[test]
    fn project_ids_must_be_plain_file_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        for bad in ["", "../escape", "a/b", ".hidden", "x.tmp.1"] {
            assert!(
                matches!(store.load_project(bad), Err(StoreError::InvalidProjectId(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn mutation_writes_before_publishing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());

        let count = store
            .mutate_project("alpha", |graph| {
                graph.insert(Element::new("R1", "RequirementUsage"), None)?;
                Ok::<_, crate::graph::GraphError>((graph.len(), true))
            })
            .expect("mutation succeeds");
        assert_eq!(count, 1);

        // A fresh store sees the write without sharing any cache.
        let reopened = self::store(dir.path());
        assert!(reopened.load_project("alpha").expect("loads").contains("R1"));
    }

    #[test]
    fn failed_mutation_leaves_cache_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());

        let result: Result<(), _> = store.mutate_project("alpha", |graph| {
            graph
                .insert(Element::new("R1", "RequirementUsage"), None)
                .expect("insert works on the copy");
            Err::<((), bool), _>("abort")
        });
        assert!(matches!(result, Err(StoreMutationError::Mutation("abort"))));
        assert!(store.load_project("alpha").expect("loads").is_empty());
    }

    #[test]
    fn invalidate_cache_reloads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        store.load_project("alpha").expect("loads");

        let mut external = Graph::new();
        external
            .insert(Element::new("ext", "Comment"), None)
            .expect("insert");
        let other = self::store(dir.path());
        other.save_project("alpha", &external).expect("saves");

        assert!(!store.load_project("alpha").expect("cached").contains("ext"));
        assert!(store.invalidate_cache("alpha").expect("reloads"));
        assert!(store.load_project("alpha").expect("reloaded").contains("ext"));
        assert!(!store.invalidate_cache("never-loaded").expect("nothing cached"));
    }

    #[test]
    fn list_ignores_foreign_and_temporary_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());
        store.load_project("beta").expect("loads");
        store.load_project("alpha").expect("loads");
        fs::write(dir.path().join("notes.txt"), "x").expect("fixture");
        fs::write(dir.path().join("alpha.json.tmp.1.2"), "x").expect("fixture");

        assert_eq!(
            store.list_projects().expect("lists"),
            vec!["alpha".to_string(), "beta".to_string()]
        );
    }

    #[test]
    fn invalidation_waits_for_in_flight_mutation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let owned = store(dir.path());
        let store = &owned;
        store.load_project("p").expect("loads");
        let (parked_tx, parked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        thread::scope(|scope| {
            let first = scope.spawn(move || {
                store.mutate_project("p", |graph| {
                    graph.insert(Element::new("A", "Comment"), None)?;
                    parked_tx.send(()).expect("signal parked writer");
                    release_rx.recv().expect("writer released");
                    Ok::<_, GraphError>(((), true))
                })
            });
            parked_rx.recv().expect("writer parked");

            let reload = scope.spawn(move || store.invalidate_cache("p"));
            thread::sleep(Duration::from_millis(50));
            let second = scope.spawn(move || {
                store.mutate_project("p", |graph| {
                    graph.insert(Element::new("B", "Comment"), None)?;
                    Ok::<_, GraphError>(((), true))
                })
            });
            thread::sleep(Duration::from_millis(50));
            release_tx.send(()).expect("release writer");

            first.join().expect("first writer").expect("first mutation");
            assert!(reload.join().expect("reload thread").expect("reloads"));
            second.join().expect("second writer").expect("second mutation");
        });

        let cached = store.load_project("p").expect("cached");
        let durable = self::store(dir.path()).load_project("p").expect("durable");
        for graph in [&cached, &durable] {
            assert!(graph.contains("A") && graph.contains("B"));
        }
    }

    #[test]
    fn concurrent_first_loads_create_the_project_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let owned = store(dir.path());
        let store = &owned;
        let barrier = &Barrier::new(8);

        thread::scope(|scope| {
            for n in 0..8 {
                scope.spawn(move || {
                    barrier.wait();
                    store
                        .mutate_project("fresh", |graph| {
                            graph.insert(Element::new(format!("e{n}"), "Comment"), None)?;
                            Ok::<_, GraphError>(((), true))
                        })
                        .expect("mutation succeeds");
                });
            }
        });

        let durable = self::store(dir.path()).load_project("fresh").expect("durable");
        assert_eq!(durable.len(), 8);
    }
}
