// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-file transaction coordination.
//!
//! A transaction groups file operations, detects conflicts up front, orders
//! execution topologically by declared dependencies, and backs up touched
//! files so any failure rolls the workspace back to its pre-transaction
//! state: created files are removed, modified and deleted files restored.

use crate::error::WorkspaceError;
use crate::scoped::ScopedFs;
use sbx_core::{ChangeType, Clock, FileChange};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

sbx_core::define_id! {
    /// Unique identifier for a multi-file transaction.
    pub struct TransactionId;
}

/// Kind of file operation inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Create,
    Modify,
    Delete,
    Move,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Create => write!(f, "create"),
            OpKind::Modify => write!(f, "modify"),
            OpKind::Delete => write!(f, "delete"),
            OpKind::Move => write!(f, "move"),
        }
    }
}

/// One file operation inside a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOperation {
    pub op_type: OpKind,
    /// Path relative to the sandbox root (absolute paths are rejected by the
    /// scoped resolver at apply time)
    pub file_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Destination, move only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<PathBuf>,
    /// Paths whose operations must apply before this one
    #[serde(default)]
    pub dependencies: Vec<PathBuf>,
    /// Set by conflict resolution; skipped operations are not applied
    #[serde(default)]
    pub skip: bool,
}

impl FileOperation {
    pub fn create(file_path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            op_type: OpKind::Create,
            file_path: file_path.into(),
            content: Some(content.into()),
            target_path: None,
            dependencies: Vec::new(),
            skip: false,
        }
    }

    pub fn modify(file_path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            op_type: OpKind::Modify,
            file_path: file_path.into(),
            content: Some(content.into()),
            target_path: None,
            dependencies: Vec::new(),
            skip: false,
        }
    }

    pub fn delete(file_path: impl Into<PathBuf>) -> Self {
        Self {
            op_type: OpKind::Delete,
            file_path: file_path.into(),
            content: None,
            target_path: None,
            dependencies: Vec::new(),
            skip: false,
        }
    }

    pub fn rename(file_path: impl Into<PathBuf>, target_path: impl Into<PathBuf>) -> Self {
        Self {
            op_type: OpKind::Move,
            file_path: file_path.into(),
            content: None,
            target_path: Some(target_path.into()),
            dependencies: Vec::new(),
            skip: false,
        }
    }

    pub fn with_dependency(mut self, dep: impl Into<PathBuf>) -> Self {
        self.dependencies.push(dep.into());
        self
    }
}

/// Severity of a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Category of a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Multiple operations touch the same file
    Content,
    /// Dependency cycle among operations
    Circular,
    /// Dependency on a path that is neither in the transaction nor on disk
    Dependency,
}

/// A conflict detected at transaction creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileConflict {
    pub kind: ConflictKind,
    pub severity: ConflictSeverity,
    /// Paths involved; for circular conflicts, the cycle members in order
    pub paths: Vec<PathBuf>,
    /// Indices into the transaction's operation list
    pub operations: Vec<usize>,
    pub description: String,
    pub suggested_resolution: String,
    #[serde(default)]
    pub resolved: bool,
}

/// Strategy for resolving a content conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Concatenate contents into the first operation, skip the rest
    Merge,
    /// Chain the operations through dependencies so they apply in order
    Sequential,
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    #[default]
    Pending,
    Executing,
    Completed,
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Pending => write!(f, "pending"),
            TransactionState::Executing => write!(f, "executing"),
            TransactionState::Completed => write!(f, "completed"),
            TransactionState::RolledBack => write!(f, "rolled_back"),
        }
    }
}

/// An atomic group of file operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiFileTransaction {
    pub id: TransactionId,
    pub operations: Vec<FileOperation>,
    pub conflicts: Vec<FileConflict>,
    /// Original path -> backup path, populated during execution
    #[serde(default)]
    pub backup_paths: BTreeMap<PathBuf, PathBuf>,
    /// Indices of successfully applied operations
    #[serde(default)]
    pub completed_operations: Vec<usize>,
    /// Indices of operations that failed to apply
    #[serde(default)]
    pub failed_operations: Vec<usize>,
    #[serde(default)]
    pub state: TransactionState,
}

impl MultiFileTransaction {
    /// True when no unresolved critical conflict blocks execution.
    pub fn executable(&self) -> bool {
        !self
            .conflicts
            .iter()
            .any(|c| c.severity == ConflictSeverity::Critical && !c.resolved)
    }
}

/// Status summary for callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub id: TransactionId,
    pub state: TransactionState,
    pub operation_count: usize,
    pub completed: usize,
    pub failed: usize,
    pub conflict_count: usize,
    pub unresolved_critical: usize,
}

/// Result of a successful transaction execution.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionReport {
    pub id: TransactionId,
    /// File changes in application order, with before/after content
    pub changes: Vec<FileChange>,
    pub applied: usize,
    pub skipped: usize,
}

/// Coordinates multi-file transactions for one workspace.
pub struct TransactionCoordinator<C: Clock> {
    fs: ScopedFs,
    clock: C,
    transactions: Mutex<HashMap<TransactionId, MultiFileTransaction>>,
}

impl<C: Clock> TransactionCoordinator<C> {
    pub fn new(fs: ScopedFs, clock: C) -> Self {
        Self {
            fs,
            clock,
            transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Register a transaction, detecting conflicts.
    ///
    /// Conflicts never block creation; critical ones block execution until
    /// resolved.
    pub fn create_transaction(
        &self,
        id: impl Into<TransactionId>,
        operations: Vec<FileOperation>,
    ) -> Result<MultiFileTransaction, WorkspaceError> {
        let id = id.into();
        let conflicts = self.detect_conflicts(&operations);
        let transaction = MultiFileTransaction {
            id: id.clone(),
            operations,
            conflicts,
            backup_paths: BTreeMap::new(),
            completed_operations: Vec::new(),
            failed_operations: Vec::new(),
            state: TransactionState::Pending,
        };
        tracing::debug!(
            transaction = %id,
            operations = transaction.operations.len(),
            conflicts = transaction.conflicts.len(),
            "transaction created"
        );
        self.transactions
            .lock()
            .insert(id, transaction.clone());
        Ok(transaction)
    }

    /// Apply a transaction's operations in topological order with backup and
    /// rollback.
    pub fn execute_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionReport, WorkspaceError> {
        let mut transaction = self
            .transactions
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| WorkspaceError::TransactionNotFound(id.to_string()))?;

        if !transaction.executable() {
            return Err(WorkspaceError::Validation(format!(
                "transaction {} has unresolved critical conflicts",
                id
            )));
        }

        transaction.state = TransactionState::Executing;
        let order = topological_order(&transaction.operations);

        // Back up every existing file a modify/delete will touch, preserving
        // relative layout under the backup directory.
        let backup_dir = self
            .fs
            .root()
            .join(".sandbox_backups")
            .join(format!("{}_{}", id, self.clock.epoch_ms()));
        let result = self.apply_in_order(&mut transaction, &order, &backup_dir);

        match result {
            Ok(report) => {
                transaction.state = TransactionState::Completed;
                if backup_dir.exists() {
                    let _ = std::fs::remove_dir_all(&backup_dir);
                }
                self.transactions.lock().insert(id.clone(), transaction);
                tracing::info!(transaction = %id, applied = report.applied, "transaction committed");
                Ok(report)
            }
            Err(err) => {
                self.rollback(&mut transaction, &backup_dir);
                transaction.state = TransactionState::RolledBack;
                self.transactions.lock().insert(id.clone(), transaction);
                tracing::warn!(transaction = %id, error = %err, "transaction rolled back");
                Err(err)
            }
        }
    }

    /// Resolve a content conflict by index.
    pub fn resolve_conflict(
        &self,
        id: &TransactionId,
        conflict_index: usize,
        strategy: ResolutionStrategy,
    ) -> Result<(), WorkspaceError> {
        let mut transactions = self.transactions.lock();
        let transaction = transactions
            .get_mut(id)
            .ok_or_else(|| WorkspaceError::TransactionNotFound(id.to_string()))?;
        let conflict = transaction
            .conflicts
            .get(conflict_index)
            .cloned()
            .ok_or_else(|| {
                WorkspaceError::Validation(format!("no conflict at index {}", conflict_index))
            })?;
        if conflict.kind != ConflictKind::Content {
            return Err(WorkspaceError::Validation(format!(
                "conflict {} is not a content conflict",
                conflict_index
            )));
        }

        match strategy {
            ResolutionStrategy::Merge => {
                let mut merged = Vec::new();
                for &op_index in &conflict.operations {
                    if let Some(op) = transaction.operations.get(op_index) {
                        if let Some(content) = &op.content {
                            merged.push(content.clone());
                        }
                    }
                }
                let mut first = true;
                for &op_index in &conflict.operations {
                    if let Some(op) = transaction.operations.get_mut(op_index) {
                        if first {
                            op.content = Some(merged.join("\n"));
                            first = false;
                        } else {
                            op.skip = true;
                        }
                    }
                }
            }
            ResolutionStrategy::Sequential => {
                // Chain each operation on its predecessor's path; the
                // topological order then applies them in declaration order.
                for window in conflict.operations.windows(2) {
                    let prior_path = transaction
                        .operations
                        .get(window[0])
                        .map(|op| op.file_path.clone());
                    if let (Some(path), Some(op)) =
                        (prior_path, transaction.operations.get_mut(window[1]))
                    {
                        op.dependencies.push(path);
                    }
                }
            }
        }

        if let Some(conflict) = transaction.conflicts.get_mut(conflict_index) {
            conflict.resolved = true;
        }
        Ok(())
    }

    /// Current status of a transaction.
    pub fn transaction_status(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionStatus, WorkspaceError> {
        let transactions = self.transactions.lock();
        let transaction = transactions
            .get(id)
            .ok_or_else(|| WorkspaceError::TransactionNotFound(id.to_string()))?;
        Ok(TransactionStatus {
            id: transaction.id.clone(),
            state: transaction.state,
            operation_count: transaction.operations.len(),
            completed: transaction.completed_operations.len(),
            failed: transaction.failed_operations.len(),
            conflict_count: transaction.conflicts.len(),
            unresolved_critical: transaction
                .conflicts
                .iter()
                .filter(|c| c.severity == ConflictSeverity::Critical && !c.resolved)
                .count(),
        })
    }

    /// Snapshot of a transaction, if registered.
    pub fn transaction(&self, id: &TransactionId) -> Option<MultiFileTransaction> {
        self.transactions.lock().get(id).cloned()
    }

    // --- conflict detection ---

    fn detect_conflicts(&self, operations: &[FileOperation]) -> Vec<FileConflict> {
        let mut conflicts = Vec::new();

        // Same-path groups
        let mut by_path: BTreeMap<&Path, Vec<usize>> = BTreeMap::new();
        for (index, op) in operations.iter().enumerate() {
            by_path.entry(op.file_path.as_path()).or_default().push(index);
        }
        for (path, group) in &by_path {
            if group.len() < 2 {
                continue;
            }
            let kinds: Vec<OpKind> = group
                .iter()
                .filter_map(|&i| operations.get(i).map(|op| op.op_type))
                .collect();
            let has_delete = kinds.contains(&OpKind::Delete);
            let has_create = kinds.contains(&OpKind::Create);
            let modify_count = kinds.iter().filter(|k| **k == OpKind::Modify).count();

            let (severity, description, suggestion) = if has_delete {
                (
                    ConflictSeverity::Critical,
                    format!("{} is deleted and also touched by other operations", path.display()),
                    "drop the delete or the other operations".to_string(),
                )
            } else if modify_count > 1 {
                (
                    ConflictSeverity::High,
                    format!("{} is modified by {} operations", path.display(), modify_count),
                    "merge or sequential".to_string(),
                )
            } else if has_create {
                (
                    ConflictSeverity::High,
                    format!("{} is created and modified in the same transaction", path.display()),
                    "sequential".to_string(),
                )
            } else {
                continue;
            };

            conflicts.push(FileConflict {
                kind: ConflictKind::Content,
                severity,
                paths: vec![path.to_path_buf()],
                operations: group.clone(),
                description,
                suggested_resolution: suggestion,
                resolved: false,
            });
        }

        // Dependency cycles
        if let Some(cycle) = find_cycle(operations) {
            let paths: Vec<PathBuf> = cycle
                .iter()
                .filter_map(|&i| operations.get(i).map(|op| op.file_path.clone()))
                .collect();
            let names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
            conflicts.push(FileConflict {
                kind: ConflictKind::Circular,
                severity: ConflictSeverity::Critical,
                paths,
                operations: cycle,
                description: format!("circular dependency: {}", names.join(" -> ")),
                suggested_resolution: "break the dependency cycle".to_string(),
                resolved: false,
            });
        }

        // Unresolvable dependencies
        let tx_paths: BTreeSet<&Path> =
            operations.iter().map(|op| op.file_path.as_path()).collect();
        for (index, op) in operations.iter().enumerate() {
            for dep in &op.dependencies {
                if tx_paths.contains(dep.as_path()) {
                    continue;
                }
                let on_disk = self
                    .fs
                    .resolve(dep)
                    .map(|p| p.exists())
                    .unwrap_or(false);
                if !on_disk {
                    conflicts.push(FileConflict {
                        kind: ConflictKind::Dependency,
                        severity: ConflictSeverity::High,
                        paths: vec![op.file_path.clone(), dep.clone()],
                        operations: vec![index],
                        description: format!(
                            "{} depends on {}, which is neither in the transaction nor on disk",
                            op.file_path.display(),
                            dep.display()
                        ),
                        suggested_resolution: "add an operation for the dependency or drop it"
                            .to_string(),
                        resolved: false,
                    });
                }
            }
        }

        conflicts
    }

    // --- execution ---

    fn apply_in_order(
        &self,
        transaction: &mut MultiFileTransaction,
        order: &[usize],
        backup_dir: &Path,
    ) -> Result<TransactionReport, WorkspaceError> {
        let mut changes = Vec::new();
        let mut skipped = 0usize;

        for &index in order {
            let op = match transaction.operations.get(index) {
                Some(op) => op.clone(),
                None => continue,
            };
            if op.skip {
                skipped += 1;
                continue;
            }

            match self.apply_op(transaction, index, &op, backup_dir) {
                Ok(change) => {
                    transaction.completed_operations.push(index);
                    changes.push(change);
                }
                Err(err) => {
                    transaction.failed_operations.push(index);
                    return Err(err);
                }
            }
        }

        Ok(TransactionReport {
            id: transaction.id.clone(),
            applied: transaction.completed_operations.len(),
            skipped,
            changes,
        })
    }

    fn apply_op(
        &self,
        transaction: &mut MultiFileTransaction,
        _index: usize,
        op: &FileOperation,
        backup_dir: &Path,
    ) -> Result<FileChange, WorkspaceError> {
        let resolved = self.fs.resolve(&op.file_path)?;
        let now = self.clock.epoch_ms();
        let owner = transaction.id.to_string();

        match op.op_type {
            OpKind::Create => {
                if resolved.exists() {
                    return Err(WorkspaceError::FileExists(op.file_path.clone()));
                }
                let content = op.content.clone().unwrap_or_default();
                self.fs.write(&op.file_path, &content)?;
                Ok(FileChange::new(resolved, ChangeType::Create, now)
                    .with_after(content)
                    .with_owner(owner))
            }
            OpKind::Modify => {
                if !resolved.exists() {
                    return Err(WorkspaceError::FileNotFound(op.file_path.clone()));
                }
                self.backup_file(transaction, &op.file_path, &resolved, backup_dir)?;
                let before = std::fs::read_to_string(&resolved)?;
                let content = op.content.clone().unwrap_or_default();
                self.fs.write(&op.file_path, &content)?;
                Ok(FileChange::new(resolved, ChangeType::Modify, now)
                    .with_before(before)
                    .with_after(content)
                    .with_owner(owner))
            }
            OpKind::Delete => {
                if !resolved.exists() {
                    return Err(WorkspaceError::FileNotFound(op.file_path.clone()));
                }
                self.backup_file(transaction, &op.file_path, &resolved, backup_dir)?;
                let before = std::fs::read_to_string(&resolved).unwrap_or_default();
                std::fs::remove_file(&resolved)?;
                Ok(FileChange::new(resolved, ChangeType::Delete, now)
                    .with_before(before)
                    .with_owner(owner))
            }
            OpKind::Move => {
                let target = op.target_path.clone().ok_or_else(|| {
                    WorkspaceError::Validation(format!(
                        "move of {} has no target path",
                        op.file_path.display()
                    ))
                })?;
                if !resolved.exists() {
                    return Err(WorkspaceError::FileNotFound(op.file_path.clone()));
                }
                self.backup_file(transaction, &op.file_path, &resolved, backup_dir)?;
                let resolved_target = self.fs.resolve(&target)?;
                if let Some(parent) = resolved_target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::rename(&resolved, &resolved_target)?;
                Ok(FileChange::new(resolved, ChangeType::Move, now)
                    .with_after(resolved_target.to_string_lossy())
                    .with_owner(owner))
            }
        }
    }

    fn backup_file(
        &self,
        transaction: &mut MultiFileTransaction,
        relative: &Path,
        resolved: &Path,
        backup_dir: &Path,
    ) -> Result<(), WorkspaceError> {
        if transaction.backup_paths.contains_key(relative) {
            return Ok(());
        }
        let within = resolved
            .strip_prefix(self.fs.root())
            .unwrap_or(relative)
            .to_path_buf();
        let backup_path = backup_dir.join(&within);
        if let Some(parent) = backup_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(resolved, &backup_path)?;
        transaction
            .backup_paths
            .insert(relative.to_path_buf(), backup_path);
        Ok(())
    }

    fn rollback(&self, transaction: &mut MultiFileTransaction, backup_dir: &Path) {
        // Remove files created by this transaction, newest first.
        for &index in transaction.completed_operations.iter().rev() {
            let Some(op) = transaction.operations.get(index) else {
                continue;
            };
            if op.op_type == OpKind::Create {
                if let Ok(resolved) = self.fs.resolve(&op.file_path) {
                    let _ = std::fs::remove_file(resolved);
                }
            }
            if op.op_type == OpKind::Move {
                if let Some(target) = &op.target_path {
                    if let (Ok(to), Ok(from)) =
                        (self.fs.resolve(target), self.fs.resolve(&op.file_path))
                    {
                        let _ = std::fs::rename(to, from);
                    }
                }
            }
        }

        // Restore every backed-up file to its original location.
        for (relative, backup_path) in &transaction.backup_paths {
            if let Ok(resolved) = self.fs.resolve(relative) {
                if let Some(parent) = resolved.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                let _ = std::fs::copy(backup_path, resolved);
            }
        }

        if backup_dir.exists() {
            let _ = std::fs::remove_dir_all(backup_dir);
        }
    }
}

/// Dependency edges among operations.
///
/// A dependency on another file's path orders this operation after every
/// operation on that path; a dependency on the operation's own path orders it
/// after earlier-declared operations on that path only (sequential chains).
fn dependency_edges(operations: &[FileOperation]) -> Vec<Vec<usize>> {
    let mut by_path: BTreeMap<&Path, Vec<usize>> = BTreeMap::new();
    for (index, op) in operations.iter().enumerate() {
        by_path.entry(op.file_path.as_path()).or_default().push(index);
    }

    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); operations.len()];
    for (index, op) in operations.iter().enumerate() {
        for dep in &op.dependencies {
            let Some(group) = by_path.get(dep.as_path()) else {
                continue;
            };
            let same_path = dep == &op.file_path;
            for &other in group {
                if other == index {
                    continue;
                }
                if same_path && other > index {
                    continue;
                }
                incoming[index].push(other);
            }
        }
    }
    incoming
}

/// Kahn's algorithm over the dependency edges; ties break by declaration
/// order. Operations left out by a cycle are appended in declaration order
/// (creation already flagged the cycle as a critical conflict).
fn topological_order(operations: &[FileOperation]) -> Vec<usize> {
    let incoming = dependency_edges(operations);
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); operations.len()];
    let mut in_degree = vec![0usize; operations.len()];
    for (index, deps) in incoming.iter().enumerate() {
        for &dep in deps {
            outgoing[dep].push(index);
            in_degree[index] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| i)
        .collect();
    let mut order = Vec::with_capacity(operations.len());

    while let Some(&index) = ready.iter().next() {
        ready.remove(&index);
        order.push(index);
        for &next in &outgoing[index] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if order.len() < operations.len() {
        for index in 0..operations.len() {
            if !order.contains(&index) {
                order.push(index);
            }
        }
    }
    order
}

/// DFS cycle detection over the dependency edges, returning the members of
/// the first cycle found.
fn find_cycle(operations: &[FileOperation]) -> Option<Vec<usize>> {
    let incoming = dependency_edges(operations);

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Gray,
        Black,
    }

    fn visit(
        node: usize,
        incoming: &[Vec<usize>],
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        marks[node] = Mark::Gray;
        stack.push(node);
        for &dep in &incoming[node] {
            match marks[dep] {
                Mark::Gray => {
                    let start = stack.iter().position(|&n| n == dep).unwrap_or(0);
                    return Some(stack[start..].to_vec());
                }
                Mark::White => {
                    if let Some(cycle) = visit(dep, incoming, marks, stack) {
                        return Some(cycle);
                    }
                }
                Mark::Black => {}
            }
        }
        stack.pop();
        marks[node] = Mark::Black;
        None
    }

    let mut marks = vec![Mark::White; operations.len()];
    let mut stack = Vec::new();
    for node in 0..operations.len() {
        if marks[node] == Mark::White {
            if let Some(cycle) = visit(node, &incoming, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "transaction_tests.rs"]
mod tests;
