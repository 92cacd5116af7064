// =============================================================================
// SCHEMA — Le graphe typé qui décrit la structure des données
// =============================================================================
//
// Un SchemaGraph est la présentation d'une catégorie :
//   - Les SOMMETS sont les types d'objets (Employee, Department...)
//   - Les ARÊTES sont des morphismes typés, de trois sortes :
//       1. Function        : totale une fois instanciée
//       2. PartialFunction : définie sur une partie de la source
//       3. Relation        : multivaluée
//   - Les ÉQUATIONS imposent que deux chemins d'arêtes dénotent le même
//     morphisme (diagramme commutatif).
//
// EXEMPLE VISUEL :
//
//   Employee ──worksIn?──▶ Department
//      ▲                        │
//      └───────secretary────────┘
//
//   équation : [secretary, worksIn] = []
//   « la secrétaire d'un département travaille dans ce département »
//   Le côté vide est l'identité : le chemin doit donc être une boucle.
//
// Chaque mutation est vérifiée AVANT d'être appliquée, et la suppression
// d'un sommet ou d'une arête entraîne en cascade celle de tout ce qui y
// fait référence. Aucune référence orpheline ne survit à une mutation.
//
// =============================================================================

use std::collections::HashMap;
use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use super::error::{CoreError, PathDefect, Side};
use super::morphism::MorphismKind;

/// Séparateur utilisé pour nommer le sommet produit `A X B`.
pub const PRODUCT_SEPARATOR: &str = " X ";

/// Suffixes des deux projections d'un produit cartésien.
pub const PROJECTION_SUFFIXES: [&str; 2] = [" projection 1", " projection 2"];

/// Un sommet = un type d'objet. Identifié par son nom.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Vertex {
    pub name: String,
}

impl Vertex {
    pub fn new(name: &str) -> Self {
        Vertex { name: name.to_string() }
    }
}

impl std::fmt::Display for Vertex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Une arête typée entre deux sommets (désignés par leur nom).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub name: String,
    pub source: String,
    pub target: String,
    pub kind: MorphismKind,
}

impl Edge {
    pub fn new(kind: MorphismKind, name: &str, source: &str, target: &str) -> Self {
        Edge {
            name: name.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            kind,
        }
    }

    pub fn function(name: &str, source: &str, target: &str) -> Self {
        Edge::new(MorphismKind::Function, name, source, target)
    }

    pub fn partial(name: &str, source: &str, target: &str) -> Self {
        Edge::new(MorphismKind::PartialFunction, name, source, target)
    }

    pub fn relation(name: &str, source: &str, target: &str) -> Self {
        Edge::new(MorphismKind::Relation, name, source, target)
    }

    /// L'arête est-elle incidente au sommet `vertex` ?
    pub fn touches(&self, vertex: &str) -> bool {
        self.source == vertex || self.target == vertex
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} : {} -> {}", self.name, self.source, self.target)
    }
}

/// Identité interne d'une arête stockée. Deux arêtes peuvent porter le même
/// nom ; leurs `EdgeId` restent distincts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId {
    kind: MorphismKind,
    seq: u64,
}

impl EdgeId {
    pub fn kind(&self) -> MorphismKind {
        self.kind
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EquationId {
    kind: MorphismKind,
    seq: u64,
}

impl EquationId {
    pub fn kind(&self) -> MorphismKind {
        self.kind
    }
}

/// Un chemin = une séquence d'arêtes, dans l'ordre de parcours.
///
/// Le chemin vide représente l'identité (du sommet fixé par le contexte).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    steps: Vec<Edge>,
}

impl Path {
    pub fn new(steps: Vec<Edge>) -> Self {
        Path { steps }
    }

    pub fn identity() -> Self {
        Path::default()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    /// La sorte la plus générale apparaissant dans le chemin.
    pub fn kind(&self) -> MorphismKind {
        self.steps
            .iter()
            .map(|e| e.kind)
            .fold(MorphismKind::Function, MorphismKind::join)
    }

    pub fn mentions(&self, edge_name: &str) -> bool {
        self.steps.iter().any(|e| e.name == edge_name)
    }

    /// (source, cible) du chemin, `None` pour le chemin vide.
    ///
    /// Échoue si la cible d'une arête n'est pas la source de la suivante.
    pub fn endpoints(&self, side: Side) -> Result<Option<(&str, &str)>, PathDefect> {
        let Some(first) = self.steps.first() else {
            return Ok(None);
        };
        let mut current = first.target.as_str();
        for (position, edge) in self.steps.iter().enumerate().skip(1) {
            if edge.source != current {
                return Err(PathDefect::Broken { side, position });
            }
            current = edge.target.as_str();
        }
        Ok(Some((first.source.as_str(), current)))
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.steps.first() {
            None => write!(f, "id"),
            Some(first) => {
                write!(f, "{}", first.source)?;
                for edge in &self.steps {
                    write!(f, ".{}", edge.name)?;
                }
                Ok(())
            }
        }
    }
}

/// Vérifie qu'on peut imposer `lhs = rhs` :
/// - chaque chemin non vide est composable
/// - deux chemins non vides partagent source et cible
/// - si un seul côté est vide, l'autre est une boucle
/// - deux côtés vides : vrai, mais n'affirme rien
pub fn check_imposable(lhs: &Path, rhs: &Path) -> Result<(), PathDefect> {
    let left = lhs.endpoints(Side::Lhs)?;
    let right = rhs.endpoints(Side::Rhs)?;
    match (left, right) {
        (Some((ls, lt)), Some((rs, rt))) => {
            if ls != rs {
                Err(PathDefect::SourceMismatch)
            } else if lt != rt {
                Err(PathDefect::TargetMismatch)
            } else {
                Ok(())
            }
        }
        (Some((s, t)), None) if s != t => Err(PathDefect::NotALoop { side: Side::Lhs }),
        (None, Some((s, t))) if s != t => Err(PathDefect::NotALoop { side: Side::Rhs }),
        _ => Ok(()),
    }
}

/// Équation de chemins nommée, de la sorte de l'arête la plus générale
/// qu'elle peut contenir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equation {
    name: String,
    kind: MorphismKind,
    lhs: Path,
    rhs: Path,
    lhs_refs: Vec<EdgeId>,
    rhs_refs: Vec<EdgeId>,
}

impl Equation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MorphismKind {
        self.kind
    }

    pub fn lhs(&self) -> &Path {
        &self.lhs
    }

    pub fn rhs(&self) -> &Path {
        &self.rhs
    }

    pub fn side(&self, side: Side) -> &Path {
        match side {
            Side::Lhs => &self.lhs,
            Side::Rhs => &self.rhs,
        }
    }

    /// Les arêtes stockées référencées par un côté, alignées sur `side(side).edges()`.
    pub fn side_refs(&self, side: Side) -> &[EdgeId] {
        match side {
            Side::Lhs => &self.lhs_refs,
            Side::Rhs => &self.rhs_refs,
        }
    }

    pub fn mentions(&self, edge_name: &str) -> bool {
        self.lhs.mentions(edge_name) || self.rhs.mentions(edge_name)
    }

    /// Sommet source commun (celui du premier côté non vide).
    pub fn source_vertex(&self) -> Option<&str> {
        self.lhs
            .edges()
            .first()
            .or_else(|| self.rhs.edges().first())
            .map(|e| e.source.as_str())
    }

    /// Deux côtés vides : satisfaite par toute instanciation.
    pub fn is_vacuous(&self) -> bool {
        self.lhs.is_identity() && self.rhs.is_identity()
    }
}

impl std::fmt::Display for Equation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: ", self.name)?;
        // un côté vide s'affiche comme l'identité du sommet source
        let source = self.source_vertex();
        for (i, path) in [&self.lhs, &self.rhs].into_iter().enumerate() {
            if i == 1 {
                write!(f, " = ")?;
            }
            match source {
                Some(vertex) if path.is_identity() => write!(f, "id_{}", vertex)?,
                _ => write!(f, "{}", path)?,
            }
        }
        Ok(())
    }
}

/// Une valeur par sorte de morphisme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByKind<T> {
    pub function: T,
    pub partial: T,
    pub relation: T,
}

impl<T> ByKind<T> {
    pub fn get(&self, kind: MorphismKind) -> &T {
        match kind {
            MorphismKind::Function => &self.function,
            MorphismKind::PartialFunction => &self.partial,
            MorphismKind::Relation => &self.relation,
        }
    }

    pub fn get_mut(&mut self, kind: MorphismKind) -> &mut T {
        match kind {
            MorphismKind::Function => &mut self.function,
            MorphismKind::PartialFunction => &mut self.partial,
            MorphismKind::Relation => &mut self.relation,
        }
    }
}

/// Compteurs par sorte (arêtes ou équations supprimées).
pub type KindCounts = ByKind<usize>;

impl KindCounts {
    pub fn total(&self) -> usize {
        self.function + self.partial + self.relation
    }
}

/// Bilan d'une suppression en cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub equations: KindCounts,
    pub edges: KindCounts,
    pub vertices: usize,
}

/// Le schéma complet.
///
/// Les arêtes et équations sont stockées par sorte, dans l'ordre
/// d'insertion. Des index (nom → arêtes, sommet → arêtes incidentes,
/// arête → équations) rendent les cascades directes.
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    pub name: String,
    vertices: IndexMap<String, Vertex>,
    edges: ByKind<IndexMap<EdgeId, Edge>>,
    equations: ByKind<IndexMap<EquationId, Equation>>,
    edges_by_name: HashMap<String, IndexSet<EdgeId>>,
    edges_by_vertex: HashMap<String, IndexSet<EdgeId>>,
    equations_by_edge: HashMap<EdgeId, IndexSet<EquationId>>,
    equations_by_name: HashMap<String, IndexSet<EquationId>>,
    next_seq: u64,
}

impl SchemaGraph {
    pub fn new(name: &str) -> Self {
        SchemaGraph {
            name: name.to_string(),
            vertices: IndexMap::new(),
            edges: ByKind::default(),
            equations: ByKind::default(),
            edges_by_name: HashMap::new(),
            edges_by_vertex: HashMap::new(),
            equations_by_edge: HashMap::new(),
            equations_by_name: HashMap::new(),
            next_seq: 0,
        }
    }

    // -------------------------------------------------------------------------
    // Lecture
    // -------------------------------------------------------------------------

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    pub fn has_vertex(&self, name: &str) -> bool {
        self.vertices.contains_key(name)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Arêtes d'une sorte, dans l'ordre d'insertion.
    pub fn edges(&self, kind: MorphismKind) -> impl Iterator<Item = &Edge> {
        self.edges.get(kind).values()
    }

    pub fn edge_entries(&self, kind: MorphismKind) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.get(kind).iter().map(|(id, e)| (*id, e))
    }

    /// Toutes les arêtes : fonctions, puis partielles, puis relations.
    pub fn all_edges(&self) -> impl Iterator<Item = &Edge> {
        MorphismKind::ALL.into_iter().flat_map(move |k| self.edges(k))
    }

    pub fn edge_count(&self) -> usize {
        MorphismKind::ALL.iter().map(|&k| self.edges.get(k).len()).sum()
    }

    pub fn edge_by_id(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.kind).get(&id)
    }

    /// Résout un nom d'arête à la sorte la plus précise sous laquelle il
    /// existe, sans dépasser `most_general`.
    pub fn resolve_edge(&self, name: &str, most_general: MorphismKind) -> Option<(EdgeId, &Edge)> {
        let ids = self.edges_by_name.get(name)?;
        MorphismKind::ALL
            .into_iter()
            .filter(|k| k.refines(most_general))
            .find_map(|kind| {
                ids.iter()
                    .find(|id| id.kind == kind)
                    .and_then(|id| self.edge_by_id(*id).map(|e| (*id, e)))
            })
    }

    /// L'arête de ce nom, résolue à la sorte la plus précise.
    pub fn edge(&self, name: &str) -> Option<&Edge> {
        self.resolve_edge(name, MorphismKind::Relation).map(|(_, e)| e)
    }

    /// Arêtes sortant d'un sommet.
    pub fn edges_from(&self, vertex: &str) -> Vec<&Edge> {
        self.incident(vertex).filter(|e| e.source == vertex).collect()
    }

    /// Arêtes entrant dans un sommet.
    pub fn edges_into(&self, vertex: &str) -> Vec<&Edge> {
        self.incident(vertex).filter(|e| e.target == vertex).collect()
    }

    fn incident<'a>(&'a self, vertex: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges_by_vertex
            .get(vertex)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.edge_by_id(*id))
    }

    pub fn equations(&self, kind: MorphismKind) -> impl Iterator<Item = &Equation> {
        self.equations.get(kind).values()
    }

    pub fn all_equations(&self) -> impl Iterator<Item = &Equation> {
        MorphismKind::ALL.into_iter().flat_map(move |k| self.equations(k))
    }

    pub fn equation_count(&self) -> usize {
        MorphismKind::ALL.iter().map(|&k| self.equations.get(k).len()).sum()
    }

    pub fn equation_by_id(&self, id: EquationId) -> Option<&Equation> {
        self.equations.get(id.kind).get(&id)
    }

    /// Première équation de ce nom (sortes parcourues de la plus précise à la plus générale).
    pub fn equation(&self, name: &str) -> Option<&Equation> {
        let ids = self.equations_by_name.get(name)?;
        let id = ids.iter().min_by_key(|id| (id.kind, id.seq))?;
        self.equations.get(id.kind).get(id)
    }

    // -------------------------------------------------------------------------
    // Ajouts
    // -------------------------------------------------------------------------

    /// Ajoute un sommet. Échoue si le nom est déjà pris.
    pub fn add_vertex(&mut self, name: &str) -> Result<&mut Self, CoreError> {
        if self.vertices.contains_key(name) {
            return Err(CoreError::DuplicateVertex { name: name.to_string() });
        }
        self.vertices.insert(name.to_string(), Vertex::new(name));
        debug!(graph = %self.name, vertex = name, "vertex added");
        Ok(self)
    }

    /// Ajoute une arête. Les deux extrémités doivent exister.
    ///
    /// Les noms d'arêtes ne sont PAS uniques : deux arêtes de même nom
    /// rendent ensuite la résolution par nom ambiguë (la plus précise gagne).
    pub fn add_edge(
        &mut self,
        kind: MorphismKind,
        name: &str,
        source: &str,
        target: &str,
    ) -> Result<&mut Self, CoreError> {
        self.insert_edge(Edge::new(kind, name, source, target))?;
        Ok(self)
    }

    pub fn add_function_edge(
        &mut self,
        name: &str,
        source: &str,
        target: &str,
    ) -> Result<&mut Self, CoreError> {
        self.add_edge(MorphismKind::Function, name, source, target)
    }

    pub fn add_partial_edge(
        &mut self,
        name: &str,
        source: &str,
        target: &str,
    ) -> Result<&mut Self, CoreError> {
        self.add_edge(MorphismKind::PartialFunction, name, source, target)
    }

    pub fn add_relation_edge(
        &mut self,
        name: &str,
        source: &str,
        target: &str,
    ) -> Result<&mut Self, CoreError> {
        self.add_edge(MorphismKind::Relation, name, source, target)
    }

    pub(crate) fn insert_edge(&mut self, edge: Edge) -> Result<EdgeId, CoreError> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.vertices.contains_key(endpoint) {
                return Err(CoreError::UnknownVertex { name: endpoint.clone() });
            }
        }
        debug!(graph = %self.name, edge = %edge.name, kind = %edge.kind, "edge added");
        Ok(self.attach_edge(edge))
    }

    /// Ajoute une équation `lhs = rhs` de la sorte `kind`.
    ///
    /// Chaque nom est résolu à la sorte la plus précise sous laquelle il
    /// existe, parmi celles que `kind` autorise.
    pub fn add_equation(
        &mut self,
        kind: MorphismKind,
        name: &str,
        lhs: &[&str],
        rhs: &[&str],
    ) -> Result<&mut Self, CoreError> {
        self.insert_equation(kind, name, lhs, rhs)?;
        Ok(self)
    }

    pub fn add_function_equation(
        &mut self,
        name: &str,
        lhs: &[&str],
        rhs: &[&str],
    ) -> Result<&mut Self, CoreError> {
        self.add_equation(MorphismKind::Function, name, lhs, rhs)
    }

    pub fn add_partial_equation(
        &mut self,
        name: &str,
        lhs: &[&str],
        rhs: &[&str],
    ) -> Result<&mut Self, CoreError> {
        self.add_equation(MorphismKind::PartialFunction, name, lhs, rhs)
    }

    pub fn add_relation_equation(
        &mut self,
        name: &str,
        lhs: &[&str],
        rhs: &[&str],
    ) -> Result<&mut Self, CoreError> {
        self.add_equation(MorphismKind::Relation, name, lhs, rhs)
    }

    pub(crate) fn insert_equation(
        &mut self,
        kind: MorphismKind,
        name: &str,
        lhs: &[&str],
        rhs: &[&str],
    ) -> Result<EquationId, CoreError> {
        let (lhs, lhs_refs) = self.resolve_path(lhs, kind)?;
        let (rhs, rhs_refs) = self.resolve_path(rhs, kind)?;
        check_imposable(&lhs, &rhs).map_err(|defect| CoreError::NotImposable {
            equation: name.to_string(),
            defect,
        })?;
        debug!(graph = %self.name, equation = name, kind = %kind, "equation added");
        Ok(self.attach_equation(Equation {
            name: name.to_string(),
            kind,
            lhs,
            rhs,
            lhs_refs,
            rhs_refs,
        }))
    }

    fn resolve_path(
        &self,
        names: &[&str],
        kind: MorphismKind,
    ) -> Result<(Path, Vec<EdgeId>), CoreError> {
        let mut steps = Vec::with_capacity(names.len());
        let mut refs = Vec::with_capacity(names.len());
        for name in names {
            let (id, edge) = self
                .resolve_edge(name, kind)
                .ok_or_else(|| CoreError::UnknownEdge { name: name.to_string() })?;
            steps.push(edge.clone());
            refs.push(id);
        }
        Ok((Path::new(steps), refs))
    }

    /// Produit cartésien `A X B` : un nouveau sommet et ses deux projections.
    /// Renvoie le nom du sommet produit.
    pub fn add_cartesian_product(
        &mut self,
        factor1: &str,
        factor2: &str,
    ) -> Result<String, CoreError> {
        for factor in [factor1, factor2] {
            if !self.has_vertex(factor) {
                return Err(CoreError::UnknownVertex { name: factor.to_string() });
            }
        }
        let product = format!("{factor1}{PRODUCT_SEPARATOR}{factor2}");
        self.add_vertex(&product)?;
        for (factor, suffix) in [factor1, factor2].into_iter().zip(PROJECTION_SUFFIXES) {
            let projection = format!("{product}{suffix}");
            self.insert_edge(Edge::function(&projection, &product, factor))?;
        }
        Ok(product)
    }

    // -------------------------------------------------------------------------
    // Suppressions (en cascade)
    // -------------------------------------------------------------------------

    /// Supprime toutes les équations de ce nom, quelle que soit leur sorte.
    pub fn remove_equation(&mut self, name: &str) -> Result<KindCounts, CoreError> {
        let ids: Vec<EquationId> = self
            .equations_by_name
            .get(name)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        if ids.is_empty() {
            return Err(CoreError::UnknownEquation { name: name.to_string() });
        }
        let mut removed = KindCounts::default();
        for id in ids {
            if self.detach_equation(id).is_some() {
                *removed.get_mut(id.kind) += 1;
            }
        }
        debug!(graph = %self.name, equation = name, removed = removed.total(), "equation removed");
        Ok(removed)
    }

    /// Supprime toutes les arêtes de ce nom, après les équations qui les utilisent.
    pub fn remove_edge(&mut self, name: &str) -> Result<RemovalReport, CoreError> {
        let ids: Vec<EdgeId> = self
            .edges_by_name
            .get(name)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        if ids.is_empty() {
            return Err(CoreError::UnknownEdge { name: name.to_string() });
        }
        let report = self.remove_edges(&ids);
        debug!(
            graph = %self.name,
            edge = name,
            edges = report.edges.total(),
            equations = report.equations.total(),
            "edge removed"
        );
        Ok(report)
    }

    /// Supprime un sommet, ses arêtes incidentes et les équations qui les utilisent.
    pub fn delete_vertex(&mut self, name: &str) -> Result<RemovalReport, CoreError> {
        if !self.vertices.contains_key(name) {
            return Err(CoreError::UnknownVertex { name: name.to_string() });
        }
        let ids: Vec<EdgeId> = self
            .edges_by_vertex
            .get(name)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        let mut report = self.remove_edges(&ids);
        self.vertices.shift_remove(name);
        self.edges_by_vertex.remove(name);
        report.vertices = 1;
        debug!(
            graph = %self.name,
            vertex = name,
            edges = report.edges.total(),
            equations = report.equations.total(),
            "vertex deleted"
        );
        Ok(report)
    }

    fn remove_edges(&mut self, ids: &[EdgeId]) -> RemovalReport {
        let mut report = RemovalReport::default();
        let doomed: IndexSet<EquationId> = ids
            .iter()
            .filter_map(|id| self.equations_by_edge.get(id))
            .flatten()
            .copied()
            .collect();
        for id in doomed {
            if self.detach_equation(id).is_some() {
                *report.equations.get_mut(id.kind) += 1;
            }
        }
        for &id in ids {
            if self.detach_edge(id).is_some() {
                *report.edges.get_mut(id.kind) += 1;
            }
        }
        report
    }

    /// Retire une arête fraîchement ajoutée (aucune équation ne la référence encore).
    pub(crate) fn discard_edge(&mut self, id: EdgeId) {
        self.detach_edge(id);
    }

    pub(crate) fn discard_equation(&mut self, id: EquationId) {
        self.detach_equation(id);
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Re-vérifie tout depuis zéro : extrémités des arêtes, puis
    /// imposabilité de chaque équation sur les arêtes présentes.
    /// Renvoie le premier problème trouvé.
    pub fn validate(&self) -> Result<(), CoreError> {
        match super::validate::schema_problems(self).into_iter().next() {
            None => Ok(()),
            Some(problem) => Err(problem),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Pourquoi `equation` n'est pas imposable sur les arêtes présentes, s'il y a lieu.
    pub fn equation_defect(&self, equation: &Equation) -> Option<PathDefect> {
        for side in [Side::Lhs, Side::Rhs] {
            let path = equation.side(side);
            let refs = equation.side_refs(side);
            if refs.len() != path.len() {
                return Some(PathDefect::Broken { side, position: refs.len().min(path.len()) });
            }
            for (edge, id) in path.edges().iter().zip(refs) {
                if self.edge_by_id(*id) != Some(edge) {
                    return Some(PathDefect::MissingEdge { edge: edge.name.clone() });
                }
                if !edge.kind.refines(equation.kind) {
                    return Some(PathDefect::TooGeneral {
                        edge: edge.name.clone(),
                        kind: edge.kind,
                    });
                }
            }
        }
        check_imposable(&equation.lhs, &equation.rhs).err()
    }

    // -------------------------------------------------------------------------
    // Index
    // -------------------------------------------------------------------------

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn attach_edge(&mut self, edge: Edge) -> EdgeId {
        let id = EdgeId {
            kind: edge.kind,
            seq: self.next_seq(),
        };
        self.edges_by_name.entry(edge.name.clone()).or_default().insert(id);
        self.edges_by_vertex.entry(edge.source.clone()).or_default().insert(id);
        self.edges_by_vertex.entry(edge.target.clone()).or_default().insert(id);
        self.edges.get_mut(edge.kind).insert(id, edge);
        id
    }

    fn detach_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.get_mut(id.kind).shift_remove(&id)?;
        unindex(&mut self.edges_by_name, &edge.name, &id);
        unindex(&mut self.edges_by_vertex, &edge.source, &id);
        unindex(&mut self.edges_by_vertex, &edge.target, &id);
        self.equations_by_edge.remove(&id);
        Some(edge)
    }

    fn attach_equation(&mut self, equation: Equation) -> EquationId {
        let id = EquationId {
            kind: equation.kind,
            seq: self.next_seq(),
        };
        for edge_id in equation.lhs_refs.iter().chain(&equation.rhs_refs) {
            self.equations_by_edge.entry(*edge_id).or_default().insert(id);
        }
        self.equations_by_name.entry(equation.name.clone()).or_default().insert(id);
        self.equations.get_mut(equation.kind).insert(id, equation);
        id
    }

    fn detach_equation(&mut self, id: EquationId) -> Option<Equation> {
        let equation = self.equations.get_mut(id.kind).shift_remove(&id)?;
        for edge_id in equation.lhs_refs.iter().chain(&equation.rhs_refs) {
            unindex(&mut self.equations_by_edge, edge_id, &id);
        }
        unindex(&mut self.equations_by_name, &equation.name, &id);
        Some(equation)
    }

    /// Insère une arête sans vérifier ses extrémités (pour fabriquer des
    /// graphes corrompus dans les tests).
    #[cfg(test)]
    pub(crate) fn insert_edge_unchecked(&mut self, edge: Edge) -> EdgeId {
        self.attach_edge(edge)
    }
}

fn unindex<K, V>(index: &mut HashMap<K, IndexSet<V>>, key: &K, value: &V)
where
    K: Hash + Eq,
    V: Hash + Eq,
{
    if let Some(values) = index.get_mut(key) {
        values.shift_remove(value);
        if values.is_empty() {
            index.remove(key);
        }
    }
}

impl std::fmt::Display for SchemaGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "schema {} = literal {{", self.name)?;

        writeln!(f, "  vertices")?;
        for vertex in self.vertices() {
            writeln!(f, "    {}", vertex)?;
        }

        for (kind, title) in MorphismKind::ALL.into_iter().zip([
            "function_edges",
            "partial_function_edges",
            "relation_edges",
        ]) {
            if self.edges.get(kind).is_empty() {
                continue;
            }
            writeln!(f, "  {}", title)?;
            for edge in self.edges(kind) {
                writeln!(f, "    {}", edge)?;
            }
        }

        for (kind, title) in MorphismKind::ALL.into_iter().zip([
            "function_equations",
            "partial_function_equations",
            "relation_equations",
        ]) {
            if self.equations.get(kind).is_empty() {
                continue;
            }
            writeln!(f, "  {}", title)?;
            for equation in self.equations(kind) {
                writeln!(f, "    {}", equation)?;
            }
        }

        write!(f, "}}")
    }
}
