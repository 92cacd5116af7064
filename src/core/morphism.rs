// =============================================================================
// MORPHISM — L'algèbre des morphismes entre ensembles finis
// =============================================================================
//
// Une arête du schéma devient, une fois instanciée, un MORPHISME entre deux
// ensembles finis d'identifiants. Il y en a trois sortes, qui forment un
// treillis de raffinement (du plus précis au plus général) :
//
//   Function  ⊑  PartialFunction  ⊑  Relation
//
//   - Function        : totale, un seul y pour chaque x
//   - PartialFunction : définie sur un sous-ensemble (son domaine)
//   - Relation        : multivaluée, zéro, un ou plusieurs y pour chaque x
//
// Un morphisme ne connaît PAS son étendue : les ensembles source et cible
// sont fournis par l'appelant (l'instanciation), d'où les paramètres
// `domain` un peu partout dans ce module.
//
// UPCAST : une fonction est une fonction partielle de domaine "tout
// l'ensemble source", et une fonction partielle est une relation dont les
// images sont des singletons (ou vides hors domaine). L'inverse n'existe pas.
//
// COMPOSITION (dans l'ordre du chemin : f1 d'abord, puis f2) :
//   - fonctions  : x ↦ f2(f1(x))
//   - partielles : le domaine se RÉTRÉCIT aux x dont l'image par f1
//                  tombe dans le domaine de f2
//   - relations  : x ↦ ⋃ { f2(y) | y ∈ f1(x) }, sans doublons
//
// =============================================================================

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use super::error::CoreError;

/// Identifiant opaque d'un élément d'un ensemble fini.
pub type ElementId = u64;

/// Un ensemble fini d'éléments. Ordonné, pour des parcours déterministes.
pub type ElementSet = BTreeSet<ElementId>;

type Rule = Arc<dyn Fn(ElementId) -> ElementId + Send + Sync>;
type MultiRule = Arc<dyn Fn(ElementId) -> ElementSet + Send + Sync>;

/// Sorte d'un morphisme (ou d'une arête, ou d'une équation).
///
/// L'ordre dérivé EST le treillis de raffinement : `Function < PartialFunction < Relation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MorphismKind {
    Function,
    PartialFunction,
    Relation,
}

impl MorphismKind {
    /// Les trois sortes, de la plus précise à la plus générale.
    pub const ALL: [MorphismKind; 3] = [
        MorphismKind::Function,
        MorphismKind::PartialFunction,
        MorphismKind::Relation,
    ];

    /// `self` est-il utilisable là où `other` est demandé ?
    pub fn refines(self, other: MorphismKind) -> bool {
        self <= other
    }

    /// La plus petite sorte qui généralise les deux.
    pub fn join(self, other: MorphismKind) -> MorphismKind {
        self.max(other)
    }
}

impl fmt::Display for MorphismKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MorphismKind::Function => write!(f, "function"),
            MorphismKind::PartialFunction => write!(f, "partial function"),
            MorphismKind::Relation => write!(f, "relation"),
        }
    }
}

/// Fonction totale.
#[derive(Clone)]
pub struct Function {
    rule: Rule,
}

impl Function {
    pub fn new<F>(rule: F) -> Self
    where
        F: Fn(ElementId) -> ElementId + Send + Sync + 'static,
    {
        Function { rule: Arc::new(rule) }
    }

    pub fn identity() -> Self {
        Function::new(|x| x)
    }

    pub fn constant(y: ElementId) -> Self {
        Function::new(move |_| y)
    }

    pub fn apply(&self, x: ElementId) -> ElementId {
        (self.rule)(x)
    }

    /// Vue partielle : le domaine déclaré devient `domain`, la règle est inchangée.
    pub fn to_partial(&self, domain: &ElementSet) -> PartialFunction {
        PartialFunction {
            domain: domain.clone(),
            rule: Arc::clone(&self.rule),
        }
    }

    /// Vue relationnelle, matérialisée sur `domain` : x ↦ {f(x)}.
    pub fn to_relation(&self, domain: &ElementSet) -> Relation {
        Relation::tabulate(domain, |x| ElementSet::from([self.apply(x)]))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").finish_non_exhaustive()
    }
}

/// Fonction partielle : une règle plus le sous-ensemble où elle a un sens.
#[derive(Clone)]
pub struct PartialFunction {
    domain: ElementSet,
    rule: Rule,
}

impl PartialFunction {
    pub fn new<F>(domain: ElementSet, rule: F) -> Self
    where
        F: Fn(ElementId) -> ElementId + Send + Sync + 'static,
    {
        PartialFunction {
            domain,
            rule: Arc::new(rule),
        }
    }

    /// Construit la fonction partielle donnée par une table ; le domaine
    /// est l'ensemble des clés.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (ElementId, ElementId)>,
    {
        let table: BTreeMap<ElementId, ElementId> = pairs.into_iter().collect();
        let domain = table.keys().copied().collect();
        // Hors domaine la valeur n'est jamais lue : apply() renvoie None avant.
        PartialFunction::new(domain, move |x| table.get(&x).copied().unwrap_or(x))
    }

    /// `None` signale que `x` est hors du domaine.
    pub fn apply(&self, x: ElementId) -> Option<ElementId> {
        self.domain.contains(&x).then(|| (self.rule)(x))
    }

    pub fn domain(&self) -> &ElementSet {
        &self.domain
    }

    pub fn is_defined(&self, x: ElementId) -> bool {
        self.domain.contains(&x)
    }

    /// Vue relationnelle sur `domain` : {f(x)} si défini, ∅ sinon.
    pub fn to_relation(&self, domain: &ElementSet) -> Relation {
        Relation::tabulate(domain, |x| self.apply(x).into_iter().collect())
    }
}

impl fmt::Debug for PartialFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialFunction")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

/// Relation : chaque x a un ensemble (éventuellement vide) d'images.
#[derive(Clone)]
pub struct Relation {
    rule: MultiRule,
}

impl Relation {
    pub fn new<F>(rule: F) -> Self
    where
        F: Fn(ElementId) -> ElementSet + Send + Sync + 'static,
    {
        Relation { rule: Arc::new(rule) }
    }

    /// Construit la relation formée des couples (x, y) donnés.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (ElementId, ElementId)>,
    {
        let mut table: BTreeMap<ElementId, ElementSet> = BTreeMap::new();
        for (x, y) in pairs {
            table.entry(x).or_default().insert(y);
        }
        Relation::from_table(table)
    }

    fn from_table(table: BTreeMap<ElementId, ElementSet>) -> Self {
        Relation::new(move |x| table.get(&x).cloned().unwrap_or_default())
    }

    /// Matérialise `image` sur `domain` ; hors domaine l'image est vide.
    fn tabulate<F>(domain: &ElementSet, image: F) -> Self
    where
        F: Fn(ElementId) -> ElementSet,
    {
        let table = domain.iter().map(|&x| (x, image(x))).collect();
        Relation::from_table(table)
    }

    /// L'absence d'image n'est pas une erreur : c'est l'ensemble vide.
    pub fn apply(&self, x: ElementId) -> ElementSet {
        (self.rule)(x)
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation").finish_non_exhaustive()
    }
}

/// Un morphisme de l'une des trois sortes.
///
/// Tout algorithme qui a besoin de "la vue la plus générale" demande
/// explicitement un upcast via [`Morphism::to_partial`] ou
/// [`Morphism::to_relation`].
#[derive(Debug, Clone)]
pub enum Morphism {
    Function(Function),
    Partial(PartialFunction),
    Relation(Relation),
}

impl Morphism {
    pub fn kind(&self) -> MorphismKind {
        match self {
            Morphism::Function(_) => MorphismKind::Function,
            Morphism::Partial(_) => MorphismKind::PartialFunction,
            Morphism::Relation(_) => MorphismKind::Relation,
        }
    }

    /// Identité de la sorte `kind` sur `domain`.
    pub fn identity(kind: MorphismKind, domain: &ElementSet) -> Morphism {
        match kind {
            MorphismKind::Function => Morphism::Function(Function::identity()),
            MorphismKind::PartialFunction => {
                Morphism::Partial(PartialFunction::new(domain.clone(), |x| x))
            }
            MorphismKind::Relation => {
                Morphism::Relation(Relation::tabulate(domain, |x| ElementSet::from([x])))
            }
        }
    }

    pub fn to_function(&self) -> Result<Function, CoreError> {
        match self {
            Morphism::Function(f) => Ok(f.clone()),
            other => Err(kind_mismatch(MorphismKind::Function, other.kind())),
        }
    }

    pub fn to_partial(&self, domain: &ElementSet) -> Result<PartialFunction, CoreError> {
        match self {
            Morphism::Function(f) => Ok(f.to_partial(domain)),
            Morphism::Partial(f) => Ok(f.clone()),
            Morphism::Relation(_) => Err(kind_mismatch(
                MorphismKind::PartialFunction,
                MorphismKind::Relation,
            )),
        }
    }

    pub fn to_relation(&self, domain: &ElementSet) -> Relation {
        match self {
            Morphism::Function(f) => f.to_relation(domain),
            Morphism::Partial(f) => f.to_relation(domain),
            Morphism::Relation(f) => f.clone(),
        }
    }

    /// Upcast vers `kind` (qui doit généraliser la sorte de `self`).
    pub fn upcast(&self, kind: MorphismKind, domain: &ElementSet) -> Result<Morphism, CoreError> {
        Ok(match kind {
            MorphismKind::Function => Morphism::Function(self.to_function()?),
            MorphismKind::PartialFunction => Morphism::Partial(self.to_partial(domain)?),
            MorphismKind::Relation => Morphism::Relation(self.to_relation(domain)),
        })
    }

    /// Premier couple (x, y) avec x dans `source` (et dans le domaine pour
    /// une fonction partielle) dont l'image y sort de `target`.
    pub fn image_violation(
        &self,
        source: &ElementSet,
        target: &ElementSet,
    ) -> Option<(ElementId, ElementId)> {
        match self {
            Morphism::Function(f) => source
                .iter()
                .map(|&x| (x, f.apply(x)))
                .find(|(_, y)| !target.contains(y)),
            Morphism::Partial(f) => source
                .iter()
                .filter_map(|&x| f.apply(x).map(|y| (x, y)))
                .find(|(_, y)| !target.contains(y)),
            Morphism::Relation(f) => source
                .iter()
                .flat_map(|&x| f.apply(x).into_iter().map(move |y| (x, y)))
                .find(|(_, y)| !target.contains(y)),
        }
    }
}

impl From<Function> for Morphism {
    fn from(f: Function) -> Self {
        Morphism::Function(f)
    }
}

impl From<PartialFunction> for Morphism {
    fn from(f: PartialFunction) -> Self {
        Morphism::Partial(f)
    }
}

impl From<Relation> for Morphism {
    fn from(f: Relation) -> Self {
        Morphism::Relation(f)
    }
}

fn kind_mismatch(expected: MorphismKind, found: MorphismKind) -> CoreError {
    CoreError::KindMismatch {
        name: "morphism".into(),
        expected,
        found,
    }
}

// -----------------------------------------------------------------------------
// Casts et renversement
// -----------------------------------------------------------------------------

pub fn cast_to_partial(f: &Function, domain: &ElementSet) -> PartialFunction {
    f.to_partial(domain)
}

pub fn cast_to_relation(f: &Morphism, domain: &ElementSet) -> Relation {
    f.to_relation(domain)
}

/// Relation inverse : pour chaque x de `source_domain` et chaque y ∈ f(x),
/// x est ajouté à l'image de y. Aucun couple n'est filtré : un y hors de
/// `target_universe` garde ses antécédents (la soundness le signale ailleurs).
/// La table est matérialisée sur tout `target_universe`.
pub fn reverse_relation(
    f: &Relation,
    source_domain: &ElementSet,
    target_universe: &ElementSet,
) -> Relation {
    let mut table: BTreeMap<ElementId, ElementSet> = target_universe
        .iter()
        .map(|&y| (y, ElementSet::new()))
        .collect();
    for &x in source_domain {
        for y in f.apply(x) {
            table.entry(y).or_default().insert(x);
        }
    }
    Relation::from_table(table)
}

// -----------------------------------------------------------------------------
// Composition deux à deux
// -----------------------------------------------------------------------------

/// x ↦ f2(f1(x)).
pub fn compose_functions(f1: &Function, f2: &Function) -> Function {
    let (r1, r2) = (Arc::clone(&f1.rule), Arc::clone(&f2.rule));
    Function::new(move |x| r2(r1(x)))
}

/// Domaine résultat = { x ∈ domain1 ∩ dom(f1) | f1(x) ∈ dom(f2) }.
pub fn compose_partials(
    f1: &PartialFunction,
    f2: &PartialFunction,
    domain1: &ElementSet,
) -> PartialFunction {
    let domain = domain1
        .iter()
        .copied()
        .filter(|&x| f1.apply(x).is_some_and(|y| f2.is_defined(y)))
        .collect();
    let (r1, r2) = (Arc::clone(&f1.rule), Arc::clone(&f2.rule));
    PartialFunction {
        domain,
        rule: Arc::new(move |x| r2(r1(x))),
    }
}

/// image(x) = ⋃ { f2(y) | y ∈ f1(x) }, matérialisée sur `domain1`.
pub fn compose_relations(f1: &Relation, f2: &Relation, domain1: &ElementSet) -> Relation {
    Relation::tabulate(domain1, |x| {
        f1.apply(x).into_iter().flat_map(|y| f2.apply(y)).collect()
    })
}

// -----------------------------------------------------------------------------
// Composition le long d'un chemin
// -----------------------------------------------------------------------------
//
// `domains[i]` est l'ensemble source du i-ème morphisme. Le pli se fait à
// droite : f0 ; (f1 ; (... ; fn)).

fn check_path(morphisms: usize, domains: usize) -> Result<(), CoreError> {
    if morphisms != domains {
        return Err(CoreError::ArityMismatch { morphisms, domains });
    }
    if morphisms == 0 {
        return Err(CoreError::EmptyPath);
    }
    Ok(())
}

pub fn compose_many_functions(
    morphisms: &[&Morphism],
    domains: &[&ElementSet],
) -> Result<Function, CoreError> {
    check_path(morphisms.len(), domains.len())?;
    let mut acc: Option<Function> = None;
    for m in morphisms.iter().rev() {
        let f = m.to_function()?;
        acc = Some(match acc {
            None => f,
            Some(rest) => compose_functions(&f, &rest),
        });
    }
    acc.ok_or(CoreError::EmptyPath)
}

pub fn compose_many_partials(
    morphisms: &[&Morphism],
    domains: &[&ElementSet],
) -> Result<PartialFunction, CoreError> {
    check_path(morphisms.len(), domains.len())?;
    let mut acc: Option<PartialFunction> = None;
    for (m, domain) in morphisms.iter().zip(domains).rev() {
        let f = m.to_partial(domain)?;
        acc = Some(match acc {
            None => f,
            Some(rest) => compose_partials(&f, &rest, domain),
        });
    }
    acc.ok_or(CoreError::EmptyPath)
}

pub fn compose_many_relations(
    morphisms: &[&Morphism],
    domains: &[&ElementSet],
) -> Result<Relation, CoreError> {
    check_path(morphisms.len(), domains.len())?;
    let mut acc: Option<Relation> = None;
    for (m, domain) in morphisms.iter().zip(domains).rev() {
        let f = m.to_relation(domain);
        acc = Some(match acc {
            None => f,
            Some(rest) => compose_relations(&f, &rest, domain),
        });
    }
    acc.ok_or(CoreError::EmptyPath)
}

/// Compose un chemin à la sorte `kind`. Un chemin d'une seule arête est
/// son morphisme, upcasté.
pub fn compose_many(
    kind: MorphismKind,
    morphisms: &[&Morphism],
    domains: &[&ElementSet],
) -> Result<Morphism, CoreError> {
    check_path(morphisms.len(), domains.len())?;
    if let ([single], [domain]) = (morphisms, domains) {
        return single.upcast(kind, domain);
    }
    Ok(match kind {
        MorphismKind::Function => compose_many_functions(morphisms, domains)?.into(),
        MorphismKind::PartialFunction => compose_many_partials(morphisms, domains)?.into(),
        MorphismKind::Relation => compose_many_relations(morphisms, domains)?.into(),
    })
}

// -----------------------------------------------------------------------------
// Égalité sur un domaine fini
// -----------------------------------------------------------------------------

/// Premier x de `domain` où f et g diffèrent.
pub fn function_disagreement(f: &Function, g: &Function, domain: &ElementSet) -> Option<ElementId> {
    domain.iter().copied().find(|&x| f.apply(x) != g.apply(x))
}

/// Premier x de `domain` où f et g diffèrent, définition comprise :
/// défini d'un côté seulement compte comme un désaccord.
pub fn partial_disagreement(
    f: &PartialFunction,
    g: &PartialFunction,
    domain: &ElementSet,
) -> Option<ElementId> {
    domain.iter().copied().find(|&x| f.apply(x) != g.apply(x))
}

pub fn relation_disagreement(f: &Relation, g: &Relation, domain: &ElementSet) -> Option<ElementId> {
    domain.iter().copied().find(|&x| f.apply(x) != g.apply(x))
}

pub fn functions_equal(f: &Function, g: &Function, domain: &ElementSet) -> bool {
    function_disagreement(f, g, domain).is_none()
}

pub fn partials_equal(f: &PartialFunction, g: &PartialFunction, domain: &ElementSet) -> bool {
    partial_disagreement(f, g, domain).is_none()
}

pub fn relations_equal(f: &Relation, g: &Relation, domain: &ElementSet) -> bool {
    relation_disagreement(f, g, domain).is_none()
}

/// Compare deux morphismes en tant que morphismes de la sorte `kind`.
pub fn disagreement(
    kind: MorphismKind,
    f: &Morphism,
    g: &Morphism,
    domain: &ElementSet,
) -> Result<Option<ElementId>, CoreError> {
    Ok(match kind {
        MorphismKind::Function => {
            function_disagreement(&f.to_function()?, &g.to_function()?, domain)
        }
        MorphismKind::PartialFunction => {
            partial_disagreement(&f.to_partial(domain)?, &g.to_partial(domain)?, domain)
        }
        MorphismKind::Relation => {
            relation_disagreement(&f.to_relation(domain), &g.to_relation(domain), domain)
        }
    })
}
