//! Output control for time loops.
//!
//! [`Io`] decides at every call to [`Io::dump`] which kinds of output are due, computes the
//! registered diagnostics and hands everything to an [`OutputSink`]. Writing actual files is
//! left to the sink.
use crate::fields::FieldStore;
use crate::Real;
use eyre::{eyre, WrapErr};
use log::info;
use serde::{Deserialize, Serialize};

fn default_dump_frequency() -> usize {
    1
}

fn default_true() -> bool {
    true
}

/// Values of one field at selected degrees of freedom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PointDataRequest {
    pub field: String,
    pub indices: Vec<usize>,
}

/// How often the different kinds of output are produced, counted in calls to [`Io::dump`].
///
/// A frequency of zero disables the corresponding output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct OutputConfig {
    #[serde(default = "default_dump_frequency")]
    pub dump_frequency: usize,
    #[serde(default)]
    pub checkpoint_frequency: usize,
    /// Defaults to the dump frequency.
    #[serde(default)]
    pub point_data_frequency: Option<usize>,
    /// Whether diagnostics are written on every call.
    #[serde(default = "default_true")]
    pub dump_diagnostics: bool,
    #[serde(default)]
    pub point_data: Vec<PointDataRequest>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dump_frequency: default_dump_frequency(),
            checkpoint_frequency: 0,
            point_data_frequency: None,
            dump_diagnostics: true,
            point_data: Vec::new(),
        }
    }
}

/// Fires on the first call and then on every `frequency`-th call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrequencyCounter {
    frequency: usize,
    count: usize,
}

impl FrequencyCounter {
    pub fn new(frequency: usize) -> Self {
        Self { frequency, count: 0 }
    }

    pub fn frequency(&self) -> usize {
        self.frequency
    }

    /// Advances the counter and reports whether output is due. Never fires if the frequency is 0.
    pub fn tick(&mut self) -> bool {
        if self.frequency == 0 {
            return false;
        }
        let due = self.count % self.frequency == 0;
        self.count += 1;
        due
    }
}

/// A scalar quantity computed from the model state.
pub trait Diagnostic<T: Real>: Send {
    fn name(&self) -> String;

    /// Returns `None` if a field the diagnostic needs is missing.
    fn compute(&self, fields: &FieldStore<T>) -> Option<T>;
}

/// The Euclidean norm of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNorm {
    pub field: String,
}

impl FieldNorm {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }
}

impl<T: Real> Diagnostic<T> for FieldNorm {
    fn name(&self) -> String {
        format!("{}_norm", self.field)
    }

    fn compute(&self, fields: &FieldStore<T>) -> Option<T> {
        fields.get(&self.field).map(|v| v.norm())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Extremum {
    Min,
    Max,
}

/// The smallest or largest entry of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExtremum {
    pub field: String,
    pub extremum: Extremum,
}

impl FieldExtremum {
    pub fn min(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            extremum: Extremum::Min,
        }
    }

    pub fn max(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            extremum: Extremum::Max,
        }
    }
}

impl<T: Real> Diagnostic<T> for FieldExtremum {
    fn name(&self) -> String {
        match self.extremum {
            Extremum::Min => format!("{}_min", self.field),
            Extremum::Max => format!("{}_max", self.field),
        }
    }

    fn compute(&self, fields: &FieldStore<T>) -> Option<T> {
        let v = fields.get(&self.field)?;
        if v.is_empty() {
            return None;
        }
        Some(match self.extremum {
            Extremum::Min => v.min(),
            Extremum::Max => v.max(),
        })
    }
}

/// Receives the output selected by [`Io`].
pub trait OutputSink<T: Real> {
    fn write_fields(&mut self, t: T, fields: &FieldStore<T>) -> eyre::Result<()>;

    fn write_diagnostics(&mut self, t: T, values: &[(String, T)]) -> eyre::Result<()>;

    fn write_point_data(&mut self, t: T, field: &str, indices: &[usize], values: &[T]) -> eyre::Result<()>;

    fn write_checkpoint(&mut self, t: T, fields: &FieldStore<T>) -> eyre::Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointDataRecord<T> {
    pub t: T,
    pub field: String,
    pub indices: Vec<usize>,
    pub values: Vec<T>,
}

/// Keeps all output in memory.
#[derive(Debug, Clone)]
pub struct MemorySink<T: Real> {
    pub dumps: Vec<(T, FieldStore<T>)>,
    pub diagnostics: Vec<(T, Vec<(String, T)>)>,
    pub point_data: Vec<PointDataRecord<T>>,
    pub checkpoints: Vec<(T, FieldStore<T>)>,
}

impl<T: Real> Default for MemorySink<T> {
    fn default() -> Self {
        Self {
            dumps: Vec::new(),
            diagnostics: Vec::new(),
            point_data: Vec::new(),
            checkpoints: Vec::new(),
        }
    }
}

impl<T: Real> OutputSink<T> for MemorySink<T> {
    fn write_fields(&mut self, t: T, fields: &FieldStore<T>) -> eyre::Result<()> {
        self.dumps.push((t, fields.clone()));
        Ok(())
    }

    fn write_diagnostics(&mut self, t: T, values: &[(String, T)]) -> eyre::Result<()> {
        self.diagnostics.push((t, values.to_vec()));
        Ok(())
    }

    fn write_point_data(&mut self, t: T, field: &str, indices: &[usize], values: &[T]) -> eyre::Result<()> {
        self.point_data.push(PointDataRecord {
            t,
            field: field.to_string(),
            indices: indices.to_vec(),
            values: values.to_vec(),
        });
        Ok(())
    }

    fn write_checkpoint(&mut self, t: T, fields: &FieldStore<T>) -> eyre::Result<()> {
        self.checkpoints.push((t, fields.clone()));
        Ok(())
    }
}

/// Writes a one-line summary of every output to the log.
#[derive(Debug, Copy, Clone, Default)]
pub struct LogSink;

impl<T: Real> OutputSink<T> for LogSink {
    fn write_fields(&mut self, t: T, fields: &FieldStore<T>) -> eyre::Result<()> {
        let names: Vec<&str> = fields.names().collect();
        info!("t = {}: dumped fields {:?}", t, names);
        Ok(())
    }

    fn write_diagnostics(&mut self, t: T, values: &[(String, T)]) -> eyre::Result<()> {
        for (name, value) in values {
            info!("t = {}: {} = {}", t, name, value);
        }
        Ok(())
    }

    fn write_point_data(&mut self, t: T, field: &str, indices: &[usize], values: &[T]) -> eyre::Result<()> {
        info!("t = {}: {} at {:?} = {:?}", t, field, indices, values);
        Ok(())
    }

    fn write_checkpoint(&mut self, t: T, _fields: &FieldStore<T>) -> eyre::Result<()> {
        info!("t = {}: checkpoint", t);
        Ok(())
    }
}

/// Frequency-driven output of fields, diagnostics, point data and checkpoints.
pub struct Io<T: Real, S> {
    config: OutputConfig,
    sink: S,
    diagnostics: Vec<Box<dyn Diagnostic<T>>>,
    dump_counter: FrequencyCounter,
    checkpoint_counter: FrequencyCounter,
    point_data_counter: FrequencyCounter,
}

impl<T: Real, S: OutputSink<T>> Io<T, S> {
    pub fn new(config: OutputConfig, sink: S) -> Self {
        let point_data_frequency = config
            .point_data_frequency
            .unwrap_or(config.dump_frequency);
        Self {
            dump_counter: FrequencyCounter::new(config.dump_frequency),
            checkpoint_counter: FrequencyCounter::new(config.checkpoint_frequency),
            point_data_counter: FrequencyCounter::new(point_data_frequency),
            config,
            sink,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Diagnostic<T> + 'static) -> Self {
        self.diagnostics.push(Box::new(diagnostic));
        self
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Produces all output that is due at time `t`.
    pub fn dump(&mut self, t: T, fields: &FieldStore<T>) -> eyre::Result<()> {
        if self.config.dump_diagnostics && !self.diagnostics.is_empty() {
            let values = self
                .diagnostics
                .iter()
                .map(|diagnostic| {
                    let value = diagnostic
                        .compute(fields)
                        .ok_or_else(|| eyre!("diagnostic {} could not be computed", diagnostic.name()))?;
                    Ok((diagnostic.name(), value))
                })
                .collect::<eyre::Result<Vec<_>>>()?;
            self.sink.write_diagnostics(t, &values)?;
        }

        if !self.config.point_data.is_empty() && self.point_data_counter.tick() {
            for request in &self.config.point_data {
                let field = fields
                    .get(&request.field)
                    .ok_or_else(|| eyre!("no field named {} for point data", request.field))?;
                let values = request
                    .indices
                    .iter()
                    .map(|&i| {
                        field
                            .get(i)
                            .copied()
                            .ok_or_else(|| eyre!("index {} out of bounds for field {}", i, request.field))
                    })
                    .collect::<eyre::Result<Vec<_>>>()?;
                self.sink
                    .write_point_data(t, &request.field, &request.indices, &values)?;
            }
        }

        if self.checkpoint_counter.tick() {
            self.sink
                .write_checkpoint(t, fields)
                .wrap_err("failed to write checkpoint")?;
        }

        if self.dump_counter.tick() {
            self.sink.write_fields(t, fields)?;
        }
        Ok(())
    }
}
