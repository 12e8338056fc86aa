//! Workspace root package. It only carries shared tooling (pre-commit hooks);
//! the service, library and CLI live under `crates/`.
