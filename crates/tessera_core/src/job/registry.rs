// registry.rs - Compiled injection tables for parallel jobs
//
// Each job's declaration is resolved once against the component registry:
// component types become ids, access chains become field ordinals. Dispatch
// then only indexes into the compiled tables.

use super::parallel_job::{DataBinder, ExternalBinder, JobDeclaration};
use super::{DispatchError, ExternalData, JobRegistrationError, ParallelJob};
use crate::ecs::{short_type_name, ArchetypeDataPool, ComponentId, ComponentRegistry};
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

struct DataBinding<J> {
    id: ComponentId,
    ordinal: usize,
    bind: DataBinder<J>,
}

struct ExternalBinding<J> {
    key: String,
    type_name: &'static str,
    accepts: fn(&(dyn Any + Send + Sync)) -> bool,
    bind: ExternalBinder<J>,
}

/// Injection table of one registered job type.
pub(crate) struct CompiledJob<J> {
    name: &'static str,
    data: Vec<DataBinding<J>>,
    external: Vec<ExternalBinding<J>>,
}

impl<J: ParallelJob> CompiledJob<J> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Check that every declared external key is present with the declared
    /// type.
    pub fn check_external(&self, external: Option<&ExternalData>) -> Result<(), DispatchError> {
        for binding in &self.external {
            let value = external
                .and_then(|data| data.get(&binding.key))
                .ok_or_else(|| DispatchError::MissingExternalData {
                    job: self.name,
                    key: binding.key.clone(),
                })?;
            if !(binding.accepts)(value.as_ref()) {
                return Err(DispatchError::ExternalDataType {
                    job: self.name,
                    key: binding.key.clone(),
                    expected: binding.type_name,
                });
            }
        }
        Ok(())
    }

    /// Fresh job instance wired to `pool` and `external`.
    pub fn instantiate(
        &self,
        pool: &ArchetypeDataPool,
        external: Option<&ExternalData>,
    ) -> Result<J, DispatchError> {
        let mut job = J::default();
        for binding in &self.data {
            (binding.bind)(&mut job, pool, binding.id, binding.ordinal)?;
        }
        for binding in &self.external {
            let injected = external
                .and_then(|data| data.get(&binding.key))
                .is_some_and(|value| (binding.bind)(&mut job, value));
            if !injected {
                return Err(DispatchError::ExternalDataType {
                    job: self.name,
                    key: binding.key.clone(),
                    expected: binding.type_name,
                });
            }
        }
        Ok(job)
    }
}

/// Catalog of parallel job types known to the scheduler.
///
/// Registration happens at startup; share the finished registry as
/// `Arc<JobRegistry>`.
pub struct JobRegistry {
    components: Arc<ComponentRegistry>,
    jobs: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    names: Vec<&'static str>,
}

impl JobRegistry {
    pub fn new(components: Arc<ComponentRegistry>) -> Self {
        Self {
            components,
            jobs: HashMap::new(),
            names: Vec::new(),
        }
    }

    /// Validate and compile the declaration of `J`.
    pub fn register<J: ParallelJob>(&mut self) -> Result<(), JobRegistrationError> {
        let job = short_type_name::<J>();
        if self.jobs.contains_key(&TypeId::of::<J>()) {
            return Err(JobRegistrationError::DuplicateJob { job });
        }

        let mut declaration = JobDeclaration::<J>::new();
        J::declare(&mut declaration);

        let mut data = Vec::with_capacity(declaration.data.len());
        for query in declaration.data {
            let id = self.components.id_of_type(query.type_id).ok_or(
                JobRegistrationError::UnregisteredComponent {
                    job,
                    component: query.component,
                },
            )?;
            let chain = query.chain.join(".");
            let ordinal = self
                .components
                .field_ordinal(id, &query.chain)
                .map_err(|_| JobRegistrationError::InvalidAccessChain {
                    job,
                    component: query.component,
                    chain: chain.clone(),
                })?;
            let actual = self
                .components
                .meta(id)
                .and_then(|meta| meta.fields.get(ordinal))
                .map(|field| field.kind)
                .ok_or_else(|| JobRegistrationError::InvalidAccessChain {
                    job,
                    component: query.component,
                    chain: chain.clone(),
                })?;
            if actual != query.kind {
                return Err(JobRegistrationError::FieldTypeMismatch {
                    job,
                    component: query.component,
                    chain,
                    requested: query.kind,
                    actual,
                });
            }
            data.push(DataBinding {
                id,
                ordinal,
                bind: query.bind,
            });
        }

        let mut keys = HashSet::new();
        let mut external = Vec::with_capacity(declaration.external.len());
        for query in declaration.external {
            if !keys.insert(query.key.clone()) {
                return Err(JobRegistrationError::DuplicateExternalKey {
                    job,
                    key: query.key,
                });
            }
            external.push(ExternalBinding {
                key: query.key,
                type_name: query.type_name,
                accepts: query.accepts,
                bind: query.bind,
            });
        }

        tracing::debug!(
            job,
            data_queries = data.len(),
            external_queries = external.len(),
            "registered parallel job"
        );
        let compiled: Arc<CompiledJob<J>> = Arc::new(CompiledJob {
            name: job,
            data,
            external,
        });
        self.jobs.insert(TypeId::of::<J>(), compiled);
        self.names.push(job);
        Ok(())
    }

    pub(crate) fn compiled<J: ParallelJob>(&self) -> Option<Arc<CompiledJob<J>>> {
        Arc::clone(self.jobs.get(&TypeId::of::<J>())?)
            .downcast::<CompiledJob<J>>()
            .ok()
    }

    pub fn contains<J: ParallelJob>(&self) -> bool {
        self.jobs.contains_key(&TypeId::of::<J>())
    }

    /// Registered job names, in registration order.
    pub fn job_names(&self) -> &[&'static str] {
        &self.names
    }

    pub fn components(&self) -> &Arc<ComponentRegistry> {
        &self.components
    }
}
