// =============================================================================
// INSTANCE — Une instanciation concrète d'un SchemaGraph
// =============================================================================
//
// Une INSTANTIATED DB donne un contenu au schéma :
//   - Pour chaque SOMMET, un ensemble fini d'éléments (des u64 opaques)
//   - Pour chaque ARÊTE, un morphisme concret de la MÊME sorte
//
// EXEMPLE :
//   Employee   = { 1, 2 }
//   Department = { 10 }
//   worksIn    = { 1 ↦ 10 }          (2 n'a pas de département)
//   secretary  = { 10 ↦ 1 }
//
// Elle est valide si :
//   1. le schéma lui-même est valide
//   2. chaque morphisme envoie sa source (son domaine défini) dans sa cible
//   3. chaque équation commute : les deux côtés, composés à la sorte de
//      l'équation, coïncident sur l'ensemble source
//
// Les mutateurs passent par le schéma puis vérifient l'arête ou l'équation
// ajoutée ; en cas d'échec, l'ajout est retiré du schéma pour que les deux
// couches ne divergent jamais.
//
// =============================================================================

use std::collections::HashMap;

use tracing::{debug, warn};

use super::error::{CoreError, Side};
use super::morphism::{
    compose_many, disagreement, reverse_relation, ElementSet, Morphism, MorphismKind, Relation,
};
use super::schema::{Edge, EdgeId, Equation, Path, RemovalReport, SchemaGraph};
use super::validate;

#[derive(Debug, Clone)]
pub struct InstantiatedDb {
    pub name: String,
    schema: SchemaGraph,
    sets: HashMap<String, ElementSet>,
    morphisms: HashMap<EdgeId, Morphism>,
}

impl InstantiatedDb {
    /// Crée une instanciation vide au-dessus d'un schéma, qui doit être valide.
    pub fn new(name: &str, schema: SchemaGraph) -> Result<Self, CoreError> {
        schema.validate()?;
        Ok(InstantiatedDb {
            name: name.to_string(),
            schema,
            sets: HashMap::new(),
            morphisms: HashMap::new(),
        })
    }

    pub fn schema(&self) -> &SchemaGraph {
        &self.schema
    }

    pub fn set(&self, vertex: &str) -> Option<&ElementSet> {
        self.sets.get(vertex)
    }

    /// Le morphisme de l'arête de ce nom (résolue à la sorte la plus précise).
    pub fn morphism(&self, edge_name: &str) -> Option<&Morphism> {
        let (id, _) = self.schema.resolve_edge(edge_name, MorphismKind::Relation)?;
        self.morphisms.get(&id)
    }

    pub fn morphism_by_id(&self, id: EdgeId) -> Option<&Morphism> {
        self.morphisms.get(&id)
    }

    // -------------------------------------------------------------------------
    // Affectations (sur un schéma existant)
    // -------------------------------------------------------------------------

    /// Donne (ou remplace) l'ensemble d'un sommet existant.
    pub fn assign_set(&mut self, vertex: &str, set: ElementSet) -> Result<&mut Self, CoreError> {
        if !self.schema.has_vertex(vertex) {
            return Err(CoreError::UnknownVertex { name: vertex.to_string() });
        }
        debug!(db = %self.name, vertex, elements = set.len(), "set assigned");
        self.sets.insert(vertex.to_string(), set);
        Ok(self)
    }

    /// Donne (ou remplace) le morphisme d'une arête existante.
    ///
    /// L'arête choisie est la première de ce nom dont la sorte est exactement
    /// celle du morphisme.
    pub fn assign_morphism(
        &mut self,
        edge_name: &str,
        morphism: Morphism,
    ) -> Result<&mut Self, CoreError> {
        let found = morphism.kind();
        let id = self
            .schema
            .edge_entries(found)
            .find(|(_, e)| e.name == edge_name)
            .map(|(id, _)| id);
        let Some(id) = id else {
            return Err(match self.schema.edge(edge_name) {
                Some(edge) => CoreError::KindMismatch {
                    name: edge_name.to_string(),
                    expected: edge.kind,
                    found,
                },
                None => CoreError::UnknownEdge { name: edge_name.to_string() },
            });
        };
        debug!(db = %self.name, edge = edge_name, kind = %found, "morphism assigned");
        self.morphisms.insert(id, morphism);
        Ok(self)
    }

    // -------------------------------------------------------------------------
    // Mutations des deux couches
    // -------------------------------------------------------------------------

    pub fn add_vertex(&mut self, name: &str, set: ElementSet) -> Result<&mut Self, CoreError> {
        self.schema.add_vertex(name)?;
        self.sets.insert(name.to_string(), set);
        Ok(self)
    }

    /// Ajoute une arête et son morphisme. L'arête est retirée du schéma si
    /// le morphisme n'envoie pas la source dans la cible.
    pub fn add_edge(
        &mut self,
        kind: MorphismKind,
        name: &str,
        source: &str,
        target: &str,
        morphism: Morphism,
    ) -> Result<&mut Self, CoreError> {
        let edge = Edge::new(kind, name, source, target);
        if morphism.kind() != kind {
            return Err(CoreError::KindMismatch {
                name: name.to_string(),
                expected: kind,
                found: morphism.kind(),
            });
        }
        let id = self.schema.insert_edge(edge.clone())?;
        if let Err(err) = self.check_edge(&edge, &morphism) {
            self.schema.discard_edge(id);
            warn!(db = %self.name, edge = name, error = %err, "edge rolled back");
            return Err(err);
        }
        self.morphisms.insert(id, morphism);
        Ok(self)
    }

    /// Ajoute une équation, qui doit commuter sur les données présentes.
    pub fn add_equation(
        &mut self,
        kind: MorphismKind,
        name: &str,
        lhs: &[&str],
        rhs: &[&str],
    ) -> Result<&mut Self, CoreError> {
        let id = self.schema.insert_equation(kind, name, lhs, rhs)?;
        let checked = match self.schema.equation_by_id(id) {
            Some(equation) => self.check_equation(equation),
            None => Err(CoreError::UnknownEquation { name: name.to_string() }),
        };
        if let Err(err) = checked {
            self.schema.discard_equation(id);
            warn!(db = %self.name, equation = name, error = %err, "equation rolled back");
            return Err(err);
        }
        Ok(self)
    }

    pub fn remove_edge(&mut self, name: &str) -> Result<RemovalReport, CoreError> {
        let report = self.schema.remove_edge(name)?;
        self.drop_stale_morphisms();
        Ok(report)
    }

    pub fn delete_vertex(&mut self, name: &str) -> Result<RemovalReport, CoreError> {
        let report = self.schema.delete_vertex(name)?;
        self.sets.remove(name);
        self.drop_stale_morphisms();
        Ok(report)
    }

    fn drop_stale_morphisms(&mut self) {
        let schema = &self.schema;
        self.morphisms.retain(|id, _| schema.edge_by_id(*id).is_some());
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Structure, puis soundness des arêtes, puis équations.
    /// Renvoie le premier problème de la première phase en échec.
    pub fn validate(&self) -> Result<(), CoreError> {
        match validate::validate_instance(self) {
            Ok(()) => Ok(()),
            Err(errors) => match errors.into_iter().next() {
                Some(first) => Err(first.error),
                None => Ok(()),
            },
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    fn set_for(&self, vertex: &str) -> Result<&ElementSet, CoreError> {
        self.sets
            .get(vertex)
            .ok_or_else(|| CoreError::MissingSet { vertex: vertex.to_string() })
    }

    fn morphism_for(&self, id: EdgeId, edge: &Edge) -> Result<&Morphism, CoreError> {
        self.morphisms
            .get(&id)
            .ok_or_else(|| CoreError::MissingMorphism { edge: edge.name.clone() })
    }

    /// L'arête porte un morphisme de sa sorte, qui envoie son ensemble
    /// source (domaine défini) dans son ensemble cible.
    pub fn check_edge(&self, edge: &Edge, morphism: &Morphism) -> Result<(), CoreError> {
        if morphism.kind() != edge.kind {
            return Err(CoreError::KindMismatch {
                name: edge.name.clone(),
                expected: edge.kind,
                found: morphism.kind(),
            });
        }
        let source = self.set_for(&edge.source)?;
        let target = self.set_for(&edge.target)?;
        match morphism.image_violation(source, target) {
            None => Ok(()),
            Some((element, image)) => Err(CoreError::DomainViolation {
                edge: edge.name.clone(),
                element,
                image,
            }),
        }
    }

    pub fn check_edge_id(&self, id: EdgeId) -> Result<(), CoreError> {
        let edge = self
            .schema
            .edge_by_id(id)
            .ok_or_else(|| CoreError::UnknownEdge { name: format!("{id:?}") })?;
        self.check_edge(edge, self.morphism_for(id, edge)?)
    }

    /// Les deux côtés, composés à la sorte de l'équation, coïncident sur
    /// l'ensemble source. Un côté vide vaut l'identité.
    pub fn check_equation(&self, equation: &Equation) -> Result<(), CoreError> {
        let Some(vertex) = equation.source_vertex() else {
            return Ok(());
        };
        let domain = self.set_for(vertex)?;
        let lhs = self.compose_side(equation, Side::Lhs, domain)?;
        let rhs = self.compose_side(equation, Side::Rhs, domain)?;
        match disagreement(equation.kind(), &lhs, &rhs, domain)? {
            None => Ok(()),
            Some(element) => Err(CoreError::EquationViolation {
                equation: equation.name().to_string(),
                element,
            }),
        }
    }

    fn compose_side(
        &self,
        equation: &Equation,
        side: Side,
        domain: &ElementSet,
    ) -> Result<Morphism, CoreError> {
        let path = equation.side(side);
        if path.is_identity() {
            return Ok(Morphism::identity(equation.kind(), domain));
        }
        let (morphisms, domains) = self.path_inputs(path.edges(), equation.side_refs(side))?;
        compose_many(equation.kind(), &morphisms, &domains)
    }

    fn path_inputs(
        &self,
        edges: &[Edge],
        refs: &[EdgeId],
    ) -> Result<(Vec<&Morphism>, Vec<&ElementSet>), CoreError> {
        let mut morphisms = Vec::with_capacity(edges.len());
        let mut domains = Vec::with_capacity(edges.len());
        for (edge, id) in edges.iter().zip(refs) {
            morphisms.push(self.morphism_for(*id, edge)?);
            domains.push(self.set_for(&edge.source)?);
        }
        Ok((morphisms, domains))
    }

    // -------------------------------------------------------------------------
    // Vues dérivées
    // -------------------------------------------------------------------------

    /// Le morphisme dénoté par un chemin, à la sorte la plus générale qui y
    /// apparaît. Chaque nom est résolu à sa sorte la plus précise.
    pub fn compose_path(&self, edge_names: &[&str]) -> Result<Morphism, CoreError> {
        let mut edges = Vec::with_capacity(edge_names.len());
        let mut refs = Vec::with_capacity(edge_names.len());
        for name in edge_names {
            let (id, edge) = self
                .schema
                .resolve_edge(name, MorphismKind::Relation)
                .ok_or_else(|| CoreError::UnknownEdge { name: name.to_string() })?;
            edges.push(edge.clone());
            refs.push(id);
        }
        let path = Path::new(edges);
        path.endpoints(Side::Lhs).map_err(|defect| CoreError::NotImposable {
            equation: edge_names.join("."),
            defect,
        })?;
        let (morphisms, domains) = self.path_inputs(path.edges(), &refs)?;
        compose_many(path.kind(), &morphisms, &domains)
    }

    /// Vue « entrante » d'une arête : la relation inverse, de la cible
    /// vers la source.
    pub fn incoming(&self, edge_name: &str) -> Result<Relation, CoreError> {
        let (id, edge) = self
            .schema
            .resolve_edge(edge_name, MorphismKind::Relation)
            .ok_or_else(|| CoreError::UnknownEdge { name: edge_name.to_string() })?;
        let morphism = self.morphism_for(id, edge)?;
        let source = self.set_for(&edge.source)?;
        let target = self.set_for(&edge.target)?;
        Ok(reverse_relation(&morphism.to_relation(source), source, target))
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::morphism::{Function, PartialFunction};

    fn company_schema() -> SchemaGraph {
        let mut s = SchemaGraph::new("Company");
        s.add_vertex("Employee").unwrap()
         .add_vertex("Department").unwrap()
         .add_vertex("PeopleNames").unwrap()
         .add_vertex("DeptNames").unwrap();
        s.add_function_edge("manager", "Employee", "Employee").unwrap()
         .add_partial_edge("worksIn", "Employee", "Department").unwrap()
         .add_function_edge("secretary", "Department", "Employee").unwrap()
         .add_function_edge("dept name", "Department", "DeptNames").unwrap()
         .add_function_edge("first name", "Employee", "PeopleNames").unwrap()
         .add_function_edge("last name", "Employee", "PeopleNames").unwrap();
        s.add_partial_equation(
            "secretaries work in the correct department",
            &["secretary", "worksIn"],
            &[],
        )
        .unwrap();
        s
    }

    fn company_db() -> InstantiatedDb {
        let mut db = InstantiatedDb::new("company", company_schema()).unwrap();
        db.assign_set("Employee", ElementSet::from([1, 2])).unwrap()
          .assign_set("Department", ElementSet::from([10])).unwrap()
          .assign_set("PeopleNames", ElementSet::from([100, 101])).unwrap()
          .assign_set("DeptNames", ElementSet::from([200])).unwrap();
        db.assign_morphism("manager", Function::identity().into()).unwrap()
          .assign_morphism("worksIn", PartialFunction::from_pairs([(1, 10)]).into()).unwrap()
          .assign_morphism("secretary", Function::constant(1).into()).unwrap()
          .assign_morphism("dept name", Function::constant(200).into()).unwrap()
          .assign_morphism("first name", Function::constant(100).into()).unwrap()
          .assign_morphism("last name", Function::constant(101).into()).unwrap();
        db
    }

    #[test]
    fn test_company_db_is_valid() {
        let db = company_db();
        assert!(db.validate().is_ok());
        assert_eq!(db.set("Department"), Some(&ElementSet::from([10])));
    }

    #[test]
    fn test_invalid_schema_is_refused() {
        let mut s = company_schema();
        s.insert_edge_unchecked(Edge::function("ghost", "Employee", "Nowhere"));
        assert!(InstantiatedDb::new("broken", s).is_err());
    }

    #[test]
    fn test_assign_morphism_requires_exact_kind() {
        let mut db = company_db();
        let err = db
            .assign_morphism("worksIn", Function::constant(10).into())
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::KindMismatch {
                name: "worksIn".into(),
                expected: MorphismKind::PartialFunction,
                found: MorphismKind::Function,
            }
        );
        assert!(matches!(
            db.assign_morphism("nope", Function::identity().into()),
            Err(CoreError::UnknownEdge { .. })
        ));
        assert!(matches!(
            db.assign_set("Nowhere", ElementSet::new()),
            Err(CoreError::UnknownVertex { .. })
        ));
    }

    #[test]
    fn test_missing_set_and_morphism_are_reported() {
        let mut db = InstantiatedDb::new("empty", company_schema()).unwrap();
        assert!(matches!(db.validate(), Err(CoreError::MissingSet { .. })));
        db.assign_set("Employee", ElementSet::from([1])).unwrap()
          .assign_set("Department", ElementSet::from([10])).unwrap()
          .assign_set("PeopleNames", ElementSet::from([100])).unwrap()
          .assign_set("DeptNames", ElementSet::from([200])).unwrap();
        assert_eq!(
            db.validate().unwrap_err(),
            CoreError::MissingMorphism { edge: "manager".into() }
        );
    }

    #[test]
    fn test_domain_violation_is_detected() {
        let mut db = company_db();
        db.assign_morphism("secretary", Function::constant(7).into()).unwrap();
        assert_eq!(
            db.validate().unwrap_err(),
            CoreError::DomainViolation {
                edge: "secretary".into(),
                element: 10,
                image: 7,
            }
        );
    }

    #[test]
    fn test_partial_outside_domain_is_not_checked() {
        let mut db = company_db();
        // worksIn(2) vaudrait 99 mais 2 est hors du domaine déclaré
        let works_in =
            PartialFunction::new(ElementSet::from([1]), |x| if x == 1 { 10 } else { 99 });
        db.assign_morphism("worksIn", works_in.into()).unwrap();
        assert!(db.is_valid());
    }

    #[test]
    fn test_equation_violation_is_detected() {
        let mut db = company_db();
        // la secrétaire du département 10 devient 2, qui n'y travaille pas
        db.assign_morphism("secretary", Function::constant(2).into()).unwrap();
        assert_eq!(
            db.validate().unwrap_err(),
            CoreError::EquationViolation {
                equation: "secretaries work in the correct department".into(),
                element: 10,
            }
        );
    }

    #[test]
    fn test_add_edge_rolls_back_on_domain_violation() {
        let mut db = company_db();
        let edges_before = db.schema().edge_count();
        let err = db
            .add_edge(
                MorphismKind::Function,
                "mentor",
                "Employee",
                "Employee",
                Function::constant(3).into(),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::DomainViolation { .. }));
        assert_eq!(db.schema().edge_count(), edges_before);
        assert!(db.schema().edge("mentor").is_none());
        assert!(db.is_valid());
    }

    #[test]
    fn test_add_edge_rejects_kind_mismatch_before_mutation() {
        let mut db = company_db();
        let edges_before = db.schema().edge_count();
        let err = db
            .add_edge(
                MorphismKind::Function,
                "mentor",
                "Employee",
                "Employee",
                Relation::from_pairs([(1, 2)]).into(),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::KindMismatch { .. }));
        assert_eq!(db.schema().edge_count(), edges_before);
    }

    #[test]
    fn test_add_vertex_and_edge() {
        let mut db = company_db();
        db.add_vertex("Project", ElementSet::from([500, 501])).unwrap();
        db.add_edge(
            MorphismKind::Relation,
            "staffs",
            "Project",
            "Employee",
            Relation::from_pairs([(500, 1), (500, 2)]).into(),
        )
        .unwrap();
        assert!(db.is_valid());
        assert!(matches!(
            db.add_vertex("Project", ElementSet::new()),
            Err(CoreError::DuplicateVertex { .. })
        ));
    }

    #[test]
    fn test_add_equation_rolls_back_on_violation() {
        let mut db = company_db();
        // manager = identité ; manager.manager = manager tient
        db.add_equation(MorphismKind::Function, "idempotent", &["manager", "manager"], &["manager"])
            .unwrap();
        // first name ≠ last name partout
        let err = db
            .add_equation(MorphismKind::Function, "same names", &["first name"], &["last name"])
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::EquationViolation {
                equation: "same names".into(),
                element: 1,
            }
        );
        assert!(db.schema().equation("same names").is_none());
        assert_eq!(db.schema().equation_count(), 2);
    }

    #[test]
    fn test_remove_edge_drops_morphism() {
        let mut db = company_db();
        let report = db.remove_edge("worksIn").unwrap();
        assert_eq!(report.equations.partial, 1);
        assert!(db.morphism("worksIn").is_none());
        assert!(db.is_valid());
    }

    #[test]
    fn test_delete_vertex_drops_set() {
        let mut db = company_db();
        let report = db.delete_vertex("Department").unwrap();
        assert_eq!(report.edges.total(), 3);
        assert!(db.set("Department").is_none());
        assert!(db.morphism("secretary").is_none());
        assert!(db.is_valid());
    }

    #[test]
    fn test_compose_path() {
        let db = company_db();
        let composite = db.compose_path(&["secretary", "worksIn"]).unwrap();
        assert_eq!(composite.kind(), MorphismKind::PartialFunction);
        let composite = composite.to_partial(&ElementSet::from([10])).unwrap();
        assert_eq!(composite.apply(10), Some(10));

        let err = db.compose_path(&["worksIn", "first name"]).unwrap_err();
        assert!(matches!(err, CoreError::NotImposable { .. }));
        assert_eq!(db.compose_path(&[]).unwrap_err(), CoreError::EmptyPath);
    }

    #[test]
    fn test_incoming() {
        let db = company_db();
        let employees_of = db.incoming("worksIn").unwrap();
        assert_eq!(employees_of.apply(10), ElementSet::from([1]));
        let managed_by = db.incoming("manager").unwrap();
        assert_eq!(managed_by.apply(2), ElementSet::from([2]));
    }

    /// A = {1, 2}, B = {5, 6}, des relations dans les deux sens et une
    /// fonction A → B.
    fn relation_db() -> InstantiatedDb {
        let mut db = InstantiatedDb::new("rel", SchemaGraph::new("Rel")).unwrap();
        db.add_vertex("A", ElementSet::from([1, 2])).unwrap()
          .add_vertex("B", ElementSet::from([5, 6])).unwrap();
        db.add_edge(
            MorphismKind::Relation,
            "r",
            "A",
            "B",
            Relation::from_pairs([(1, 5), (1, 6), (2, 6)]).into(),
        )
        .unwrap()
        .add_edge(
            MorphismKind::Relation,
            "q",
            "B",
            "A",
            Relation::from_pairs([(5, 1), (6, 1), (6, 2)]).into(),
        )
        .unwrap()
        .add_edge(MorphismKind::Function, "shift", "A", "B", Function::new(|x| x + 4).into())
        .unwrap()
        .add_edge(
            MorphismKind::Relation,
            "unshift",
            "B",
            "A",
            Relation::from_pairs([(5, 1), (6, 2)]).into(),
        )
        .unwrap();
        db
    }

    #[test]
    fn test_relation_equation_violation_rolls_back() {
        let mut db = relation_db();
        // r puis q envoie 1 sur {1, 2}, pas sur {1}
        let err = db
            .add_equation(MorphismKind::Relation, "round trip", &["r", "q"], &[])
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::EquationViolation {
                equation: "round trip".into(),
                element: 1,
            }
        );
        assert_eq!(db.schema().equation_count(), 0);
        assert!(db.is_valid());
    }

    #[test]
    fn test_relation_equation_with_function_edge_holds() {
        let mut db = relation_db();
        db.add_equation(MorphismKind::Relation, "inverse", &["shift", "unshift"], &[])
            .unwrap();
        let eq = db.schema().equation("inverse").unwrap();
        assert_eq!(eq.lhs().kind(), MorphismKind::Relation);
        assert!(db.is_valid());

        // 2 ↦ {1, 2} casse l'équation, détectée par validate()
        db.assign_morphism("unshift", Relation::from_pairs([(5, 1), (6, 1), (6, 2)]).into())
            .unwrap();
        assert_eq!(
            db.validate().unwrap_err(),
            CoreError::EquationViolation {
                equation: "inverse".into(),
                element: 2,
            }
        );
    }
}
