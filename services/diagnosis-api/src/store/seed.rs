//! Demo records for local development.
//!
//! Seeding is idempotent per client: a client that already has any record is
//! left untouched.
use super::{DiagnosisStore, StoreError, StoreResult};
use diagnosis_common::{ClientId, CreateDiagnosisRequest};
use std::str::FromStr;

struct DemoDiagnosis {
    client_id: &'static str,
    name: &'static str,
    justification: &'static str,
    challenge: Option<(&'static str, &'static str)>,
}

const DEMO_DIAGNOSES: &[DemoDiagnosis] = &[
    DemoDiagnosis {
        client_id: "550e8400-e29b-41d4-a716-446655440001",
        name: "Major Depressive Disorder",
        justification: "Client presents with persistent depressed mood, loss of interest in activities, sleep disturbances, and feelings of worthlessness for the past 6 weeks. PHQ-9 score of 18 indicates moderate to severe depression.",
        challenge: None,
    },
    DemoDiagnosis {
        client_id: "550e8400-e29b-41d4-a716-446655440002",
        name: "Generalized Anxiety Disorder",
        justification: "Excessive worry about multiple areas of life, difficulty controlling worry, restlessness, fatigue, difficulty concentrating, and sleep problems present for over 6 months. GAD-7 score of 15 indicates moderate anxiety.",
        challenge: Some((
            "Adjustment Disorder with Anxiety",
            "Client's symptoms appear to be more situational and related to recent job loss rather than chronic anxiety. Symptoms may resolve with time and support.",
        )),
    },
    DemoDiagnosis {
        client_id: "550e8400-e29b-41d4-a716-446655440003",
        name: "Post-Traumatic Stress Disorder",
        justification: "Client reports intrusive memories of car accident, avoidance of driving, hypervigilance, and sleep disturbances. PCL-5 score of 45 indicates probable PTSD. Symptoms began after traumatic event 3 months ago.",
        challenge: None,
    },
    DemoDiagnosis {
        client_id: "550e8400-e29b-41d4-a716-446655440004",
        name: "Bipolar II Disorder",
        justification: "History of hypomanic episodes lasting 4-7 days with elevated mood, increased energy, and decreased need for sleep, alternating with depressive episodes. Family history of bipolar disorder.",
        challenge: Some((
            "Cyclothymic Disorder",
            "While client does experience mood fluctuations, the episodes may not meet full criteria for hypomania. Symptoms appear to be more chronic and less severe than typical bipolar II.",
        )),
    },
    DemoDiagnosis {
        client_id: "550e8400-e29b-41d4-a716-446655440005",
        name: "Social Anxiety Disorder",
        justification: "Marked fear of social situations, avoidance of social interactions, fear of negative evaluation, and physical symptoms in social settings. LSAS score of 72 indicates severe social anxiety.",
        challenge: None,
    },
];

/// Insert the demo diagnoses for clients that have none. Returns how many
/// records were created.
pub async fn seed_demo_data(store: &dyn DiagnosisStore) -> StoreResult<usize> {
    let mut created = 0;
    for demo in DEMO_DIAGNOSES {
        let client_id = ClientId::from_str(demo.client_id)
            .map_err(|err| StoreError::Unexpected(anyhow::anyhow!(err)))?;
        match store.find_latest_by_client(&client_id).await {
            Ok(_) => continue,
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }
        let request = CreateDiagnosisRequest {
            diagnosis_name: demo.name.to_string(),
            justification: demo.justification.to_string(),
            challenged_diagnosis: demo.challenge.map(|(name, _)| name.to_string()),
            challenged_justification: demo.challenge.map(|(_, reason)| reason.to_string()),
        };
        store.create(&client_id, request).await?;
        created += 1;
    }
    tracing::info!(created, "seeded demo diagnoses");
    Ok(created)
}
