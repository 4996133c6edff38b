//! Causal graph of credentials
//!
//! Every credential names, in `parent_credential_ids`, the credentials its issuer had seen.
//! The graph keeps those edges so that updates made without knowledge of each other can be
//! told apart from updates made one after the other. Vertices are only appended; the most
//! recent one can be withdrawn again.

use crate::core_credentials::Credential;
use crate::core_keys::PublicKey;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{trace, warn};

/// Index of a vertex; vertices are numbered in insertion order
pub type VertexId = usize;

#[derive(Debug, Clone)]
pub struct Vertex {
    pub id: PublicKey,
    pub credential: Credential,
    pub parents: Vec<VertexId>,
    pub children: Vec<VertexId>,
}

#[derive(Debug, Default)]
pub struct CredentialGraph {
    vertices: Vec<Vertex>,
    by_id: HashMap<PublicKey, VertexId>,
}

impl CredentialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn contains(&self, id: &PublicKey) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn vertex(&self, vertex: VertexId) -> &Vertex {
        &self.vertices[vertex]
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Vertices no other vertex builds on
    pub fn leaves(&self) -> Vec<VertexId> {
        (0..self.vertices.len()).filter(|&v| self.vertices[v].children.is_empty()).collect()
    }

    /// Credential ids to reference as parents of the next credential
    pub fn leaf_ids(&self) -> Vec<PublicKey> {
        self.leaves().into_iter().map(|v| self.vertices[v].id).collect()
    }

    /// Append a credential under `id`.
    ///
    /// Unknown parents are skipped. A credential that names no known parent extends every
    /// current leaf, i.e. it is ordered after everything inserted before it.
    pub fn insert(&mut self, id: PublicKey, credential: Credential) -> VertexId {
        let mut parents: Vec<VertexId> = Vec::with_capacity(credential.parent_credential_ids.len());
        for parent_id in &credential.parent_credential_ids {
            match self.by_id.get(parent_id) {
                Some(&parent) if !parents.contains(&parent) => parents.push(parent),
                Some(_) => {}
                None => warn!(
                    credential_id = %id.truncate(),
                    parent = %parent_id.truncate(),
                    "Unknown parent credential skipped"
                ),
            }
        }
        if parents.is_empty() {
            parents = self.leaves();
        }

        let vertex = self.vertices.len();
        for &parent in &parents {
            self.vertices[parent].children.push(vertex);
        }
        trace!(credential_id = %id.truncate(), vertex, parents = parents.len(), "Vertex inserted");
        self.vertices.push(Vertex { id, credential, parents, children: Vec::new() });
        self.by_id.insert(id, vertex);
        vertex
    }

    /// Withdraw the most recently inserted vertex
    pub fn pop(&mut self) -> Option<Vertex> {
        let vertex = self.vertices.pop()?;
        let removed = self.vertices.len();
        for &parent in &vertex.parents {
            self.vertices[parent].children.retain(|&child| child != removed);
        }
        self.by_id.remove(&vertex.id);
        Some(vertex)
    }

    /// Every vertex after its parents. Vertices with no path between them are ordered by
    /// issuance date, then id, so the order does not depend on insertion order.
    pub fn causal_order(&self) -> Vec<VertexId> {
        let mut pending: Vec<usize> = self.vertices.iter().map(|v| v.parents.len()).collect();
        let mut ready: BTreeSet<(u64, PublicKey, VertexId)> = BTreeSet::new();
        for (vertex, count) in pending.iter().enumerate() {
            if *count == 0 {
                ready.insert(self.sort_key(vertex));
            }
        }

        let mut order = Vec::with_capacity(self.vertices.len());
        while let Some((_, _, vertex)) = ready.pop_first() {
            order.push(vertex);
            for &child in &self.vertices[vertex].children {
                pending[child] -= 1;
                if pending[child] == 0 {
                    ready.insert(self.sort_key(child));
                }
            }
        }
        order
    }

    fn sort_key(&self, vertex: VertexId) -> (u64, PublicKey, VertexId) {
        let v = &self.vertices[vertex];
        (v.credential.issuance_date, v.id, vertex)
    }

    /// Happened-before relation over the current vertices
    pub fn causality(&self) -> Causality {
        // Parents are always inserted before their children.
        let mut ancestors: Vec<HashSet<VertexId>> = Vec::with_capacity(self.vertices.len());
        for vertex in &self.vertices {
            let mut set = HashSet::new();
            for &parent in &vertex.parents {
                set.insert(parent);
                set.extend(ancestors[parent].iter().copied());
            }
            ancestors.push(set);
        }
        Causality { ancestors }
    }
}

pub struct Causality {
    ancestors: Vec<HashSet<VertexId>>,
}

impl Causality {
    /// `a` was in view when `b` was issued
    pub fn happened_before(&self, a: VertexId, b: VertexId) -> bool {
        self.ancestors[b].contains(&a)
    }

    /// Neither vertex was in view when the other was issued
    pub fn concurrent(&self, a: VertexId, b: VertexId) -> bool {
        a != b && !self.happened_before(a, b) && !self.happened_before(b, a)
    }
}
