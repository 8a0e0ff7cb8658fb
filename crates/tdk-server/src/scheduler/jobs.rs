//! In-process registry of recurring jobs
//!
//! Each job gets its own timer task. When the timer fires the job body is
//! spawned separately so a slow run never delays the next tick.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// When a recurring job should fire next
pub trait Trigger: Send + Sync + 'static {
    /// Delay until the next fire, `None` when the trigger will never fire again
    fn next_delay(&self) -> Option<Duration>;
}

struct RegisteredJob {
    name: String,
    timer: JoinHandle<()>,
}

/// Recurring jobs keyed by id
#[derive(Default)]
pub struct CronScheduler {
    jobs: Mutex<HashMap<String, RegisteredJob>>,
}

impl CronScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `job` under `id`, replacing any job already registered with that id
    pub fn add_job<T, F, Fut>(&self, id: &str, name: &str, trigger: T, job: F)
    where
        T: Trigger,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job = Arc::new(job);
        let job_id = id.to_string();

        let timer = tokio::spawn(async move {
            loop {
                let Some(delay) = trigger.next_delay() else {
                    error!(job = %job_id, "Trigger has no further fire time, stopping job");
                    break;
                };

                tokio::time::sleep(delay).await;
                info!(job = %job_id, "Running scheduled job");

                let job = Arc::clone(&job);
                tokio::spawn(async move { job().await });
            }
        });

        let previous = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id.to_string(),
                RegisteredJob {
                    name: name.to_string(),
                    timer,
                },
            );

        if let Some(previous) = previous {
            previous.timer.abort();
            info!(job = id, name, "Replaced existing job");
        } else {
            info!(job = id, name, "Registered job");
        }
    }

    /// Stop and forget the job registered under `id`
    pub fn remove_job(&self, id: &str) -> bool {
        let removed = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);

        match removed {
            Some(job) => {
                job.timer.abort();
                info!(job = id, name = %job.name, "Removed job");
                true
            },
            None => false,
        }
    }

    /// Registered ids, sorted
    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Display name of the job registered under `id`
    pub fn job_name(&self, id: &str) -> Option<String> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|job| job.name.clone())
    }

    /// Stop every job timer
    pub fn shutdown(&self) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        for (id, job) in jobs.drain() {
            job.timer.abort();
            info!(job = %id, "Stopped job");
        }
    }
}

impl Drop for CronScheduler {
    fn drop(&mut self) {
        let jobs = self.jobs.get_mut().unwrap_or_else(PoisonError::into_inner);
        for job in jobs.values() {
            job.timer.abort();
        }
    }
}
