//! Stage graph.
//!
//! Each [`Stage`] declares the [`Artifact`]s it consumes and produces. A
//! [`Plan`] orders stages so that every input is produced before it is read.
//! Ties are broken by declaration order, which keeps runs reproducible.

use std::{collections::HashMap, fmt};

use petgraph::{
  Direction, algo,
  graph::{DiGraph, NodeIndex},
};
use serde::Serialize;

use crate::{Error, Result};

/// A durable intermediate result one stage hands to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
  ClearedTables,
  DateDimension,
  MunicipalityDimension,
  ProductDimension,
  StoreDimension,
  DateKeys,
  MunicipalityKeys,
  ProductKeys,
  StoreKeys,
  SalesFacts,
  TourismFacts,
  DemographicsFacts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  ClearTables,
  LoadDates,
  LoadMunicipalities,
  LoadProducts,
  ResolveDateKeys,
  ResolveMunicipalityKeys,
  ResolveProductKeys,
  LoadStores,
  ResolveStoreKeys,
  LoadSales,
  LoadTourism,
  LoadDemographics,
}

impl Stage {
  pub const ALL: [Stage; 12] = [
    Stage::ClearTables,
    Stage::LoadDates,
    Stage::LoadMunicipalities,
    Stage::LoadProducts,
    Stage::ResolveDateKeys,
    Stage::ResolveMunicipalityKeys,
    Stage::ResolveProductKeys,
    Stage::LoadStores,
    Stage::ResolveStoreKeys,
    Stage::LoadSales,
    Stage::LoadTourism,
    Stage::LoadDemographics,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Stage::ClearTables => "clear_tables",
      Stage::LoadDates => "load_dates",
      Stage::LoadMunicipalities => "load_municipalities",
      Stage::LoadProducts => "load_products",
      Stage::ResolveDateKeys => "resolve_date_keys",
      Stage::ResolveMunicipalityKeys => "resolve_municipality_keys",
      Stage::ResolveProductKeys => "resolve_product_keys",
      Stage::LoadStores => "load_stores",
      Stage::ResolveStoreKeys => "resolve_store_keys",
      Stage::LoadSales => "load_sales",
      Stage::LoadTourism => "load_tourism",
      Stage::LoadDemographics => "load_demographics",
    }
  }

  pub fn inputs(self) -> &'static [Artifact] {
    use Artifact::*;
    match self {
      Stage::ClearTables => &[],
      Stage::LoadDates | Stage::LoadMunicipalities | Stage::LoadProducts => &[ClearedTables],
      Stage::ResolveDateKeys => &[DateDimension],
      Stage::ResolveMunicipalityKeys => &[MunicipalityDimension],
      Stage::ResolveProductKeys => &[ProductDimension],
      Stage::LoadStores => &[MunicipalityKeys],
      Stage::ResolveStoreKeys => &[StoreDimension],
      Stage::LoadSales => &[DateKeys, ProductKeys, StoreKeys],
      Stage::LoadTourism | Stage::LoadDemographics => &[DateKeys, MunicipalityKeys],
    }
  }

  pub fn outputs(self) -> &'static [Artifact] {
    use Artifact::*;
    match self {
      Stage::ClearTables => &[ClearedTables],
      Stage::LoadDates => &[DateDimension],
      Stage::LoadMunicipalities => &[MunicipalityDimension],
      Stage::LoadProducts => &[ProductDimension],
      Stage::ResolveDateKeys => &[DateKeys],
      Stage::ResolveMunicipalityKeys => &[MunicipalityKeys],
      Stage::ResolveProductKeys => &[ProductKeys],
      Stage::LoadStores => &[StoreDimension],
      Stage::ResolveStoreKeys => &[StoreKeys],
      Stage::LoadSales => &[SalesFacts],
      Stage::LoadTourism => &[TourismFacts],
      Stage::LoadDemographics => &[DemographicsFacts],
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// Stages in an order that satisfies every declared input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
  stages: Vec<Stage>,
}

impl Plan {
  pub fn new(stages: &[Stage]) -> Result<Self> {
    let stages = toposort(stages, |s| s.inputs(), |s| s.outputs(), |s| s.name().to_owned())?;
    Ok(Self { stages })
  }

  /// The full silver-to-gold run.
  pub fn standard() -> Result<Self> { Self::new(&Stage::ALL) }

  pub fn stages(&self) -> &[Stage] { &self.stages }
}

/// Orders `nodes` so every input follows its producer. Among stages whose
/// inputs are all placed, the earliest declared goes next.
fn toposort<T: Copy>(
  nodes: &[T],
  inputs: impl Fn(&T) -> &'static [Artifact],
  outputs: impl Fn(&T) -> &'static [Artifact],
  name: impl Fn(&T) -> String,
) -> Result<Vec<T>> {
  let mut graph: DiGraph<T, Artifact> = DiGraph::with_capacity(nodes.len(), nodes.len());
  let indices: Vec<NodeIndex> = nodes.iter().map(|n| graph.add_node(*n)).collect();

  let mut producer: HashMap<Artifact, NodeIndex> = HashMap::new();
  for (node, &ix) in nodes.iter().zip(&indices) {
    for artifact in outputs(node) {
      if let Some(prev) = producer.insert(*artifact, ix) {
        return Err(Error::Plan(format!(
          "{artifact:?} produced by both {} and {}",
          name(&graph[prev]),
          name(node)
        )));
      }
    }
  }

  for (node, &ix) in nodes.iter().zip(&indices) {
    for artifact in inputs(node) {
      let Some(&from) = producer.get(artifact) else {
        return Err(Error::Plan(format!(
          "{} needs {artifact:?}, which no stage produces",
          name(node)
        )));
      };
      graph.add_edge(from, ix, *artifact);
    }
  }

  algo::toposort(&graph, None).map_err(|cycle| {
    Error::Plan(format!("cycle through {}", name(&graph[cycle.node_id()])))
  })?;

  // Node indices follow declaration order.
  let mut placed = vec![false; graph.node_count()];
  let mut order = Vec::with_capacity(graph.node_count());
  while order.len() < graph.node_count() {
    let next = graph.node_indices().find(|&ix| {
      !placed[ix.index()]
        && graph.neighbors_directed(ix, Direction::Incoming).all(|p| placed[p.index()])
    });
    let Some(ix) = next else {
      return Err(Error::Plan("stage graph is not acyclic".to_owned()));
    };
    placed[ix.index()] = true;
    order.push(graph[ix]);
  }

  Ok(order)
}
