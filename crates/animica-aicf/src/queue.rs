//! Job queue, results, and nullifiers.
//!
//! Named trees:
//!   aicf_jobs        — task_id bytes  → bincode(JobRecord)
//!   aicf_results     — task_id bytes  → bincode(ResultRecord)
//!   aicf_nullifiers  — nullifier bytes → task_id bytes (consumed set)
//!   aicf_outputs     — task_id bytes  → raw output bytes for the VM
//!
//! Jobs mutate through the lifecycle; results and nullifiers are
//! append-only (the single `consumed` flag on a result flips once).

use animica_core::types::{Hash32, Timestamp};

use crate::error::AicfError;
use crate::types::{JobKind, JobRecord, JobStatus, Lease, ResultRecord};

pub struct JobStore {
    jobs: sled::Tree,
    results: sled::Tree,
    nullifiers: sled::Tree,
    outputs: sled::Tree,
}

impl JobStore {
    pub fn open(db: &sled::Db) -> Result<Self, AicfError> {
        Ok(Self {
            jobs: db.open_tree("aicf_jobs").map_err(AicfError::storage)?,
            results: db.open_tree("aicf_results").map_err(AicfError::storage)?,
            nullifiers: db.open_tree("aicf_nullifiers").map_err(AicfError::storage)?,
            outputs: db.open_tree("aicf_outputs").map_err(AicfError::storage)?,
        })
    }

    // ── Jobs ─────────────────────────────────────────────────────────────────

    /// Enqueue a new job in `QUEUED`. Idempotent on task id: re-enqueueing
    /// an existing task is a no-op returning the stored record.
    pub fn enqueue(&self, job: JobRecord) -> Result<JobRecord, AicfError> {
        if let Some(existing) = self.get_job(&job.task_id)? {
            return Ok(existing);
        }
        self.put_job(&job)?;
        Ok(job)
    }

    pub fn get_job(&self, task_id: &Hash32) -> Result<Option<JobRecord>, AicfError> {
        match self.jobs.get(task_id.as_bytes()).map_err(AicfError::storage)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(AicfError::ser)?)),
            None => Ok(None),
        }
    }

    pub fn require_job(&self, task_id: &Hash32) -> Result<JobRecord, AicfError> {
        self.get_job(task_id)?
            .ok_or_else(|| AicfError::UnknownTask(task_id.to_hex()))
    }

    pub fn put_job(&self, job: &JobRecord) -> Result<(), AicfError> {
        self.jobs
            .insert(
                job.task_id.as_bytes(),
                bincode::serialize(job).map_err(AicfError::ser)?,
            )
            .map_err(AicfError::storage)?;
        Ok(())
    }

    /// Every job, optionally filtered by status and kind.
    pub fn list_jobs(
        &self,
        status: Option<JobStatus>,
        kind: Option<JobKind>,
    ) -> Result<Vec<JobRecord>, AicfError> {
        let mut out = Vec::new();
        for item in self.jobs.iter() {
            let (_, bytes) = item.map_err(AicfError::storage)?;
            let job: JobRecord = bincode::deserialize(&bytes).map_err(AicfError::ser)?;
            if status.is_some_and(|s| job.status != s) {
                continue;
            }
            if kind.is_some_and(|k| job.kind != k) {
                continue;
            }
            out.push(job);
        }
        Ok(out)
    }

    /// Queued jobs in deterministic draw order: priority desc, then
    /// enqueue height asc, then task id.
    pub fn queued_jobs(&self) -> Result<Vec<JobRecord>, AicfError> {
        let mut jobs = self.list_jobs(Some(JobStatus::Queued), None)?;
        jobs.sort_by(|a, b| {
            b.priority_score
                .cmp(&a.priority_score)
                .then(a.enqueue_height.cmp(&b.enqueue_height))
                .then(a.task_id.cmp(&b.task_id))
        });
        Ok(jobs)
    }

    /// Attach a lease: `QUEUED → ASSIGNED`.
    pub fn assign(&self, task_id: &Hash32, lease: Lease, now: Timestamp) -> Result<JobRecord, AicfError> {
        let mut job = self.require_job(task_id)?;
        if job.status != JobStatus::Queued {
            return Err(AicfError::InvalidTransition {
                from: job.status.to_string(),
                to: JobStatus::Assigned.to_string(),
            });
        }
        job.provider_id = Some(lease.provider_id.clone());
        job.lease = Some(lease);
        job.status = JobStatus::Assigned;
        job.updated_at = now;
        self.put_job(&job)?;
        Ok(job)
    }

    /// First heartbeat after assignment moves the job to `RUNNING`.
    pub fn mark_running(&self, task_id: &Hash32, now: Timestamp) -> Result<JobRecord, AicfError> {
        let mut job = self.require_job(task_id)?;
        if job.status != JobStatus::Assigned {
            return Err(AicfError::InvalidTransition {
                from: job.status.to_string(),
                to: JobStatus::Running.to_string(),
            });
        }
        job.status = JobStatus::Running;
        job.updated_at = now;
        self.put_job(&job)?;
        Ok(job)
    }

    /// Renew the lease on heartbeat, bounded by `max_renewals`.
    pub fn renew_lease(&self, task_id: &Hash32, now: Timestamp) -> Result<JobRecord, AicfError> {
        let mut job = self.require_job(task_id)?;
        let lease = job
            .lease
            .as_mut()
            .ok_or_else(|| AicfError::NoLease(task_id.to_hex()))?;
        if lease.renewals >= lease.max_renewals {
            return Err(AicfError::RenewalCapReached {
                max: lease.max_renewals,
            });
        }
        lease.renewals += 1;
        lease.issued_at = now;
        job.updated_at = now;
        self.put_job(&job)?;
        Ok(job)
    }

    /// Expire overdue leases and requeue (bounded retries) or fail.
    /// Returns `(requeued, failed)` task ids.
    pub fn expire_leases(
        &self,
        now: Timestamp,
        max_retries: u32,
    ) -> Result<(Vec<Hash32>, Vec<Hash32>), AicfError> {
        let mut requeued = Vec::new();
        let mut failed = Vec::new();
        for mut job in self.list_jobs(None, None)? {
            if !matches!(job.status, JobStatus::Assigned | JobStatus::Running) {
                continue;
            }
            let Some(lease) = &job.lease else { continue };
            if !lease.is_expired(now) {
                continue;
            }
            job.lease = None;
            job.provider_id = None;
            job.retries += 1;
            job.updated_at = now;
            if job.retries > max_retries {
                job.status = JobStatus::Failed;
                failed.push(job.task_id);
            } else {
                job.status = JobStatus::Queued;
                requeued.push(job.task_id);
            }
            self.put_job(&job)?;
        }
        Ok((requeued, failed))
    }

    /// Terminal failure (e.g. trap ratio below threshold).
    pub fn mark_failed(&self, task_id: &Hash32, now: Timestamp) -> Result<JobRecord, AicfError> {
        let mut job = self.require_job(task_id)?;
        job.status = JobStatus::Failed;
        job.updated_at = now;
        self.put_job(&job)?;
        Ok(job)
    }

    pub fn cancel(&self, task_id: &Hash32, now: Timestamp) -> Result<JobRecord, AicfError> {
        let mut job = self.require_job(task_id)?;
        if !matches!(job.status, JobStatus::Queued | JobStatus::Assigned) {
            return Err(AicfError::InvalidTransition {
                from: job.status.to_string(),
                to: JobStatus::Canceled.to_string(),
            });
        }
        job.status = JobStatus::Canceled;
        job.updated_at = now;
        self.put_job(&job)?;
        Ok(job)
    }

    // ── Results & nullifiers ─────────────────────────────────────────────────

    pub fn nullifier_used(&self, nullifier: &Hash32) -> Result<bool, AicfError> {
        Ok(self
            .nullifiers
            .contains_key(nullifier.as_bytes())
            .map_err(AicfError::storage)?)
    }

    /// Consume a nullifier for a task. At most once, ever.
    pub fn consume_nullifier(&self, nullifier: &Hash32, task_id: &Hash32) -> Result<(), AicfError> {
        if self.nullifier_used(nullifier)? {
            return Err(AicfError::NullifierUsed(nullifier.to_hex()));
        }
        self.nullifiers
            .insert(nullifier.as_bytes(), task_id.as_bytes().as_slice())
            .map_err(AicfError::storage)?;
        Ok(())
    }

    /// Record the single result for a task plus its raw output bytes.
    pub fn put_result(&self, result: &ResultRecord, output: &[u8]) -> Result<(), AicfError> {
        self.results
            .insert(
                result.task_id.as_bytes(),
                bincode::serialize(result).map_err(AicfError::ser)?,
            )
            .map_err(AicfError::storage)?;
        self.outputs
            .insert(result.task_id.as_bytes(), output)
            .map_err(AicfError::storage)?;
        Ok(())
    }

    pub fn get_result(&self, task_id: &Hash32) -> Result<Option<ResultRecord>, AicfError> {
        match self
            .results
            .get(task_id.as_bytes())
            .map_err(AicfError::storage)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(AicfError::ser)?)),
            None => Ok(None),
        }
    }

    /// Raw output bytes, readable from the block after finalization.
    pub fn get_output(&self, task_id: &Hash32, at_height: u64) -> Result<Option<Vec<u8>>, AicfError> {
        let Some(result) = self.get_result(task_id)? else {
            return Ok(None);
        };
        if at_height <= result.finalized_height {
            return Ok(None);
        }
        Ok(self
            .outputs
            .get(task_id.as_bytes())
            .map_err(AicfError::storage)?
            .map(|ivec| ivec.to_vec()))
    }

    /// Flip the single-consumption flag on a result.
    pub fn mark_result_consumed(&self, task_id: &Hash32) -> Result<(), AicfError> {
        let mut result = self
            .get_result(task_id)?
            .ok_or_else(|| AicfError::UnknownTask(task_id.to_hex()))?;
        result.consumed = true;
        self.results
            .insert(
                result.task_id.as_bytes(),
                bincode::serialize(&result).map_err(AicfError::ser)?,
            )
            .map_err(AicfError::storage)?;
        Ok(())
    }

    /// Completed-and-unsettled results for epoch close.
    pub fn results_finalized_in(
        &self,
        height_from: u64,
        height_to: u64,
    ) -> Result<Vec<ResultRecord>, AicfError> {
        let mut out = Vec::new();
        for item in self.results.iter() {
            let (_, bytes) = item.map_err(AicfError::storage)?;
            let r: ResultRecord = bincode::deserialize(&bytes).map_err(AicfError::ser)?;
            if r.finalized_height >= height_from && r.finalized_height <= height_to {
                out.push(r);
            }
        }
        out.sort_by(|a, b| {
            a.finalized_height
                .cmp(&b.finalized_height)
                .then(a.task_id.cmp(&b.task_id))
        });
        Ok(out)
    }
}
