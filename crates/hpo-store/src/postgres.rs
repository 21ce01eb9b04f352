//! Relational `Store` backend over `tokio-postgres`, in the same raw-client
//! style (`tokio_postgres::connect` + a detached connection task) used
//! elsewhere in the example corpus for durable numeric/columnar storage.
//! Enabled by the `postgres` feature; the schema is created on connect so a
//! fresh database needs no separate migration step.

use async_trait::async_trait;
use hpo_types::{
    BracketId, ConfigError, HpoError, HpoResult, StoreError, StudyConfig, StudyId, StudyRecord, StudyState, Trial,
    TrialId, TrialStatus,
};
use tokio_postgres::NoTls;

use crate::store::Store;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS studies (
        study_id UUID PRIMARY KEY,
        config JSONB NOT NULL,
        state TEXT NOT NULL,
        next_trial_index BIGINT NOT NULL,
        started_at TIMESTAMPTZ,
        finished_at TIMESTAMPTZ,
        error TEXT
    );
    CREATE TABLE IF NOT EXISTS trials (
        trial_id UUID PRIMARY KEY,
        study_id UUID NOT NULL REFERENCES studies(study_id),
        trial_index BIGINT NOT NULL,
        parameters JSONB NOT NULL,
        status TEXT NOT NULL,
        final_score DOUBLE PRECISION,
        bracket_id INTEGER,
        failure_kind TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        started_at TIMESTAMPTZ,
        finished_at TIMESTAMPTZ
    );
    CREATE TABLE IF NOT EXISTS observations (
        trial_id UUID NOT NULL REFERENCES trials(trial_id),
        rung_index INTEGER NOT NULL,
        score DOUBLE PRECISION NOT NULL,
        PRIMARY KEY (trial_id, rung_index)
    );
"#;

/// `Store` backed by a single `tokio_postgres::Client`. Connection pooling is
/// left to the caller (run one `PostgresStore` per pooled connection, or front
/// it with a connection-pool crate) — this type owns exactly one connection.
pub struct PostgresStore {
    client: tokio_postgres::Client,
}

impl PostgresStore {
    /// Connect to `database_url`, spawn its connection driver, and ensure the
    /// schema exists.
    pub async fn connect(database_url: &str) -> HpoResult<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| HpoError::Store(StoreError::Backend { message: e.to_string() }))?;

        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(%err, "postgres connection driver exited");
            }
        });

        client
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| HpoError::Store(StoreError::Backend { message: e.to_string() }))?;

        Ok(Self { client })
    }

    fn backend_err(e: tokio_postgres::Error) -> HpoError {
        HpoError::Store(StoreError::Backend { message: e.to_string() })
    }
}

fn status_str(status: TrialStatus) -> &'static str {
    match status {
        TrialStatus::Pending => "pending",
        TrialStatus::Running => "running",
        TrialStatus::Succeeded => "succeeded",
        TrialStatus::Pruned => "pruned",
        TrialStatus::Failed => "failed",
    }
}

fn status_from_str(s: &str) -> HpoResult<TrialStatus> {
    Ok(match s {
        "pending" => TrialStatus::Pending,
        "running" => TrialStatus::Running,
        "succeeded" => TrialStatus::Succeeded,
        "pruned" => TrialStatus::Pruned,
        "failed" => TrialStatus::Failed,
        other => {
            return Err(HpoError::Store(StoreError::Backend {
                message: format!("unrecognized trial status in database: {other}"),
            }))
        }
    })
}

fn state_str(state: StudyState) -> &'static str {
    match state {
        StudyState::Running => "running",
        StudyState::Paused => "paused",
        StudyState::Completed => "completed",
        StudyState::Cancelled => "cancelled",
        StudyState::Failed => "failed",
    }
}

fn state_from_str(s: &str) -> HpoResult<StudyState> {
    Ok(match s {
        "running" => StudyState::Running,
        "paused" => StudyState::Paused,
        "completed" => StudyState::Completed,
        "cancelled" => StudyState::Cancelled,
        "failed" => StudyState::Failed,
        other => {
            return Err(HpoError::Store(StoreError::Backend {
                message: format!("unrecognized study state in database: {other}"),
            }))
        }
    })
}

fn row_to_trial(row: &tokio_postgres::Row, observations: Vec<hpo_types::Observation>) -> HpoResult<Trial> {
    let parameters_json: serde_json::Value = row.get("parameters");
    let parameters = serde_json::from_value(parameters_json)
        .map_err(|e| HpoError::Store(StoreError::Backend { message: e.to_string() }))?;
    Ok(Trial {
        id: row.get("trial_id"),
        study_id: row.get("study_id"),
        trial_index: row.get::<_, i64>("trial_index") as usize,
        parameters,
        status: status_from_str(row.get("status"))?,
        final_score: row.get("final_score"),
        observations,
        bracket_id: row.get::<_, Option<i32>>("bracket_id").map(|b| b as BracketId),
        failure_kind: row.get("failure_kind"),
        created_at: row.get("created_at"),
        started_at: row.get("started_at"),
        finished_at: row.get("finished_at"),
    })
}

#[async_trait]
impl Store for PostgresStore {
    async fn put_study(&self, config: StudyConfig) -> HpoResult<()> {
        config
            .validate()
            .map_err(|e| HpoError::Configuration(ConfigError::InvalidStudy { message: e.to_string() }))?;
        let config_json =
            serde_json::to_value(&config).map_err(|e| HpoError::Store(StoreError::Backend { message: e.to_string() }))?;
        self.client
            .execute(
                "INSERT INTO studies (study_id, config, state, next_trial_index, started_at)
                 VALUES ($1, $2, $3, 0, now())",
                &[&config.id, &config_json, &state_str(StudyState::Running)],
            )
            .await
            .map_err(Self::backend_err)?;
        Ok(())
    }

    async fn get_study(&self, study_id: StudyId) -> HpoResult<StudyRecord> {
        let row = self
            .client
            .query_opt("SELECT * FROM studies WHERE study_id = $1", &[&study_id])
            .await
            .map_err(Self::backend_err)?
            .ok_or_else(|| {
                HpoError::Store(StoreError::StudyNotFound {
                    study_id: study_id.to_string(),
                })
            })?;
        let config_json: serde_json::Value = row.get("config");
        let config: StudyConfig =
            serde_json::from_value(config_json).map_err(|e| HpoError::Store(StoreError::Backend { message: e.to_string() }))?;
        Ok(StudyRecord {
            config,
            state: state_from_str(row.get("state"))?,
            next_trial_index: row.get::<_, i64>("next_trial_index") as usize,
            started_at: row.get("started_at"),
            finished_at: row.get("finished_at"),
            error: row.get("error"),
        })
    }

    async fn set_study_status(&self, study_id: StudyId, state: StudyState) -> HpoResult<()> {
        let finished = matches!(state, StudyState::Completed | StudyState::Cancelled | StudyState::Failed);
        self.client
            .execute(
                "UPDATE studies SET state = $2, finished_at = CASE WHEN $3 THEN now() ELSE finished_at END
                 WHERE study_id = $1",
                &[&study_id, &state_str(state), &finished],
            )
            .await
            .map_err(Self::backend_err)?;
        Ok(())
    }

    async fn add_trial(&self, study_id: StudyId, mut trial: Trial) -> HpoResult<Trial> {
        let next_index: i64 = self
            .client
            .query_one(
                "UPDATE studies SET next_trial_index = next_trial_index + 1
                 WHERE study_id = $1 RETURNING next_trial_index - 1",
                &[&study_id],
            )
            .await
            .map_err(Self::backend_err)?
            .get(0);
        trial.trial_index = next_index as usize;
        trial.study_id = study_id;

        let parameters_json = serde_json::to_value(&trial.parameters)
            .map_err(|e| HpoError::Store(StoreError::Backend { message: e.to_string() }))?;
        self.client
            .execute(
                "INSERT INTO trials
                    (trial_id, study_id, trial_index, parameters, status, bracket_id, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
                &[
                    &trial.id,
                    &trial.study_id,
                    &next_index,
                    &parameters_json,
                    &status_str(trial.status),
                    &trial.bracket_id.map(|b| b as i32),
                    &trial.created_at,
                ],
            )
            .await
            .map_err(Self::backend_err)?;
        Ok(trial)
    }

    async fn update_trial(&self, trial: Trial) -> HpoResult<()> {
        let current_status: String = self
            .client
            .query_opt("SELECT status FROM trials WHERE trial_id = $1", &[&trial.id])
            .await
            .map_err(Self::backend_err)?
            .ok_or_else(|| {
                HpoError::Store(StoreError::TrialNotFound {
                    trial_id: trial.id.to_string(),
                })
            })?
            .get(0);
        if status_from_str(&current_status)?.is_terminal() {
            return Err(HpoError::Store(StoreError::AlreadyTerminal {
                trial_id: trial.id.to_string(),
                attempted: format!("{:?}", trial.status),
            }));
        }
        self.client
            .execute(
                "UPDATE trials SET status = $2, final_score = $3, bracket_id = $4,
                    failure_kind = $5, started_at = $6, finished_at = $7
                 WHERE trial_id = $1",
                &[
                    &trial.id,
                    &status_str(trial.status),
                    &trial.final_score,
                    &trial.bracket_id.map(|b| b as i32),
                    &trial.failure_kind,
                    &trial.started_at,
                    &trial.finished_at,
                ],
            )
            .await
            .map_err(Self::backend_err)?;
        Ok(())
    }

    async fn list_trials(&self, study_id: StudyId) -> HpoResult<Vec<Trial>> {
        let rows = self
            .client
            .query(
                "SELECT * FROM trials WHERE study_id = $1 ORDER BY trial_index ASC",
                &[&study_id],
            )
            .await
            .map_err(Self::backend_err)?;

        let mut trials = Vec::with_capacity(rows.len());
        for row in rows {
            let trial_id: TrialId = row.get("trial_id");
            let obs_rows = self
                .client
                .query(
                    "SELECT rung_index, score FROM observations WHERE trial_id = $1 ORDER BY rung_index ASC",
                    &[&trial_id],
                )
                .await
                .map_err(Self::backend_err)?;
            let observations = obs_rows
                .into_iter()
                .map(|r| hpo_types::Observation {
                    rung_index: r.get::<_, i32>("rung_index") as u32,
                    score: r.get("score"),
                })
                .collect();
            trials.push(row_to_trial(&row, observations)?);
        }
        Ok(trials)
    }

    async fn record_observation(&self, trial_id: TrialId, rung_index: u32, score: f64) -> HpoResult<()> {
        let status: String = self
            .client
            .query_opt("SELECT status FROM trials WHERE trial_id = $1", &[&trial_id])
            .await
            .map_err(Self::backend_err)?
            .ok_or_else(|| {
                HpoError::Store(StoreError::TrialNotFound {
                    trial_id: trial_id.to_string(),
                })
            })?
            .get(0);
        if status_from_str(&status)?.is_terminal() {
            return Err(HpoError::Store(StoreError::AlreadyTerminal {
                trial_id: trial_id.to_string(),
                attempted: "record_observation".to_string(),
            }));
        }

        let rows_affected = self
            .client
            .execute(
                "INSERT INTO observations (trial_id, rung_index, score) VALUES ($1, $2, $3)
                 ON CONFLICT (trial_id, rung_index) DO NOTHING",
                &[&trial_id, &(rung_index as i32), &score],
            )
            .await
            .map_err(Self::backend_err)?;
        if rows_affected == 0 {
            return Err(HpoError::Store(StoreError::DuplicateObservation {
                trial_id: trial_id.to_string(),
                rung_index,
            }));
        }
        Ok(())
    }

    async fn observations_at_rung(
        &self,
        study_id: StudyId,
        bracket_id: BracketId,
        rung_index: u32,
    ) -> HpoResult<Vec<(TrialId, f64)>> {
        let rows = self
            .client
            .query(
                "SELECT o.trial_id, o.score
                 FROM observations o
                 JOIN trials t ON t.trial_id = o.trial_id
                 WHERE t.study_id = $1 AND t.bracket_id = $2 AND o.rung_index = $3
                 ORDER BY t.trial_index ASC",
                &[&study_id, &(bracket_id as i32), &(rung_index as i32)],
            )
            .await
            .map_err(Self::backend_err)?;
        Ok(rows.into_iter().map(|r| (r.get("trial_id"), r.get("score"))).collect())
    }
}
