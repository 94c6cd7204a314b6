//! Batch evaluation of many box rows.
//!
//! Each row names a box (in cm), an optional unit weight, a quantity of units
//! per box and a catalog container. The geometric count comes from the packing
//! engine; weight clipping, quantity multiplication and utilization are applied
//! here. Repeated inputs are served from a shared cache and distinct inputs are
//! packed concurrently on blocking worker threads.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use utoipa::ToSchema;

use crate::catalog::ContainerCatalog;
use crate::model::{BoxSpec, ContainerSpec};
use crate::optimizer::{PackingConfig, pack_with_config};
use crate::types::{Dimensional, quantize};
use crate::units::LengthUnit;

fn default_quantity() -> u32 {
    1
}

/// One input row. Lengths in cm, weight in kg.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchRow {
    pub length: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub unit_weight: Option<f64>,
    /// Units contained in one box
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub container_id: String,
}

/// Evaluation of one row. Box dimensions are reported in mm.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct BatchRowResult {
    pub row: usize,
    pub container_id: String,
    pub length_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
    /// Boxes per container after weight clipping
    pub boxes: usize,
    /// Boxes per container by geometry alone
    pub geometric_boxes: usize,
    pub weight_limited: bool,
    /// `boxes × quantity`
    pub total_units: u64,
    /// Volumetric utilization in percent
    pub utilization: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchRowResult {
    fn failed(row: usize, input: &BatchRow, error: String) -> Self {
        let cm = LengthUnit::Centimeter;
        Self {
            row,
            container_id: input.container_id.clone(),
            length_mm: cm.to_mm(input.length),
            width_mm: cm.to_mm(input.width),
            height_mm: cm.to_mm(input.height),
            boxes: 0,
            geometric_boxes: 0,
            weight_limited: false,
            total_units: 0,
            utilization: 0.0,
            error: Some(error),
        }
    }
}

/// Memoization key: quantized box dimensions, quantized weight and container id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    dims: (i64, i64, i64),
    weight: Option<i64>,
    container_id: String,
}

impl CacheKey {
    pub fn new(item: &BoxSpec, container_id: &str) -> Self {
        Self {
            dims: (quantize(item.length), quantize(item.width), quantize(item.height)),
            weight: item.weight.map(quantize),
            container_id: container_id.to_string(),
        }
    }
}

/// Geometric box counts by input, bounded to `capacity` entries.
///
/// An insert that would exceed the capacity clears the table first.
#[derive(Debug)]
pub struct PackCache {
    entries: HashMap<CacheKey, usize>,
    capacity: usize,
    evictions: usize,
}

impl PackCache {
    pub const DEFAULT_CAPACITY: usize = 4096;

    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            evictions: 0,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<usize> {
        self.entries.get(key).copied()
    }

    pub fn insert(&mut self, key: CacheKey, boxes: usize) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.entries.clear();
            self.evictions += 1;
            debug!("🧹 Batch cache reached {} entries, cleared", self.capacity);
        }
        self.entries.insert(key, boxes);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How often the table was cleared.
    pub fn evictions(&self) -> usize {
        self.evictions
    }
}

/// Limits `boxes` to what the container can carry.
///
/// Returns `floor(max_load / unit_weight)` when `boxes × unit_weight` exceeds
/// `max_load`, and `boxes` otherwise or when no positive weight is known.
pub fn weight_clip(boxes: usize, unit_weight: Option<f64>, max_load: f64) -> usize {
    match unit_weight {
        Some(weight) if weight > 0.0 && boxes as f64 * weight > max_load => {
            (max_load / weight).floor() as usize
        }
        _ => boxes,
    }
}

/// A row that passed validation.
struct PreparedRow {
    item: BoxSpec,
    container: ContainerSpec,
    key: CacheKey,
    quantity: u32,
}

/// Runs batches against a catalog.
#[derive(Clone)]
pub struct BatchRunner {
    catalog: Arc<ContainerCatalog>,
    config: PackingConfig,
    cache: Arc<Mutex<PackCache>>,
}

impl BatchRunner {
    /// Creates a runner whose cache holds at most `cache_capacity` inputs.
    pub fn new(catalog: Arc<ContainerCatalog>, config: PackingConfig, cache_capacity: usize) -> Self {
        Self {
            catalog,
            config,
            cache: Arc::new(Mutex::new(PackCache::new(cache_capacity))),
        }
    }

    pub async fn cached_entries(&self) -> usize {
        self.cache.lock().await.len()
    }

    fn prepare(&self, input: &BatchRow) -> Result<PreparedRow, String> {
        if input.quantity == 0 {
            return Err("Quantity must be at least 1".to_string());
        }
        let record = self
            .catalog
            .get(&input.container_id)
            .ok_or_else(|| format!("Unknown container '{}'", input.container_id))?;
        let container = record.to_spec().map_err(|e| e.to_string())?;

        let cm = LengthUnit::Centimeter;
        let mut item = BoxSpec::new(cm.to_mm(input.length), cm.to_mm(input.width), cm.to_mm(input.height))
            .map_err(|e| e.to_string())?;
        if let Some(weight) = input.unit_weight {
            item = item.with_weight(weight);
            item.validate().map_err(|e| e.to_string())?;
        }

        let key = CacheKey::new(&item, &input.container_id);
        Ok(PreparedRow {
            item,
            container,
            key,
            quantity: input.quantity,
        })
    }

    /// Evaluates all rows; the output has one entry per row, in input order.
    pub async fn run(&self, rows: &[BatchRow]) -> Vec<BatchRowResult> {
        let prepared: Vec<Result<PreparedRow, String>> = rows.iter().map(|r| self.prepare(r)).collect();

        // Counts for this batch; the shared cache may be cleared while inserting.
        let mut counts: HashMap<CacheKey, usize> = HashMap::new();
        let mut jobs: HashMap<CacheKey, (BoxSpec, ContainerSpec)> = HashMap::new();
        {
            let cache = self.cache.lock().await;
            for row in prepared.iter().flatten() {
                match cache.get(&row.key) {
                    Some(boxes) => {
                        counts.insert(row.key.clone(), boxes);
                    }
                    None => {
                        jobs.entry(row.key.clone())
                            .or_insert_with(|| (row.item.clone(), row.container.clone()));
                    }
                }
            }
        }
        debug!(
            "📋 Batch: {} rows, {} distinct inputs to pack",
            rows.len(),
            jobs.len()
        );

        let config = self.config;
        let handles = jobs.into_iter().map(|(key, (item, container))| async move {
            let outcome = tokio::task::spawn_blocking(move || pack_with_config(&item, &container, &config)).await;
            (key, outcome)
        });

        let mut failures: HashMap<CacheKey, String> = HashMap::new();
        let outcomes = join_all(handles).await;
        {
            let mut cache = self.cache.lock().await;
            for (key, outcome) in outcomes {
                match outcome {
                    Ok(Ok(result)) => {
                        counts.insert(key.clone(), result.total_boxes);
                        cache.insert(key, result.total_boxes);
                    }
                    Ok(Err(err)) => {
                        failures.insert(key, err.to_string());
                    }
                    Err(err) => {
                        warn!("❌ Packing worker failed: {}", err);
                        failures.insert(key, format!("Packing worker failed: {}", err));
                    }
                }
            }
            debug!(
                "📋 Batch cache: {} entries, cleared {} times",
                cache.len(),
                cache.evictions()
            );
        }

        rows.iter()
            .zip(prepared)
            .enumerate()
            .map(|(idx, (input, prepared))| {
                let row = match prepared {
                    Ok(row) => row,
                    Err(error) => return BatchRowResult::failed(idx, input, error),
                };
                let Some(&geometric) = counts.get(&row.key) else {
                    let error = failures
                        .get(&row.key)
                        .cloned()
                        .unwrap_or_else(|| "No packing result".to_string());
                    return BatchRowResult::failed(idx, input, error);
                };

                let boxes = weight_clip(geometric, row.item.weight, row.container.max_load);
                let utilization = if row.container.volume() > 0.0 {
                    boxes as f64 * row.item.volume() / row.container.volume() * 100.0
                } else {
                    0.0
                };
                BatchRowResult {
                    row: idx,
                    container_id: input.container_id.clone(),
                    length_mm: row.item.length,
                    width_mm: row.item.width,
                    height_mm: row.item.height,
                    boxes,
                    geometric_boxes: geometric,
                    weight_limited: boxes < geometric,
                    total_units: boxes as u64 * u64::from(row.quantity),
                    utilization,
                    error: None,
                }
            })
            .collect()
    }
}
