use anyhow::Context;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    compose_full_name, Department, EvaluationTool, Level, ObservationRecord, Observer, ScoreMap,
    Status, Teacher,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Filters applied by the store before the analyzers ever see a record.
/// Date bounds are inclusive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservationFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub evaluation_tool_id: Option<Uuid>,
    pub teacher_id: Option<Uuid>,
}

pub async fn fetch_observations(
    pool: &PgPool,
    filter: &ObservationFilter,
) -> anyhow::Result<Vec<ObservationRecord>> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT o.id, o.teacher_id, o.evaluation_tool_id, o.observer_id, \
         o.observation_date, o.scores, o.average_score, o.notes, \
         t.first_name, t.middle_name, t.last_name, et.name AS tool_name \
         FROM observation_insights.observations o \
         LEFT JOIN observation_insights.teachers t ON t.id = o.teacher_id \
         LEFT JOIN observation_insights.evaluation_tools et ON et.id = o.evaluation_tool_id \
         WHERE 1 = 1",
    );

    if let Some(start_date) = filter.start_date {
        builder.push(" AND o.observation_date >= ");
        builder.push_bind(start_date);
    }
    if let Some(end_date) = filter.end_date {
        builder.push(" AND o.observation_date <= ");
        builder.push_bind(end_date);
    }
    if let Some(tool_id) = filter.evaluation_tool_id {
        builder.push(" AND o.evaluation_tool_id = ");
        builder.push_bind(tool_id);
    }
    if let Some(teacher_id) = filter.teacher_id {
        builder.push(" AND o.teacher_id = ");
        builder.push_bind(teacher_id);
    }

    // Deterministic walk order keeps discovery-ordered reports reproducible.
    builder.push(" ORDER BY o.observation_date, o.created_at, o.id");

    let rows = builder
        .build()
        .fetch_all(pool)
        .await
        .context("failed to fetch observations")?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(observation_from_row(&row)?);
    }

    debug!(count = records.len(), "fetched observations");
    Ok(records)
}

fn observation_from_row(row: &PgRow) -> anyhow::Result<ObservationRecord> {
    let first_name: Option<String> = row.try_get("first_name")?;
    let middle_name: Option<String> = row.try_get("middle_name")?;
    let last_name: Option<String> = row.try_get("last_name")?;
    let teacher_name = match (first_name, last_name) {
        (Some(first), Some(last)) => {
            Some(compose_full_name(&first, middle_name.as_deref(), &last))
        }
        _ => None,
    };

    let scores: Json<ScoreMap> = row.try_get("scores")?;

    Ok(ObservationRecord {
        id: row.try_get("id")?,
        teacher_id: row.try_get("teacher_id")?,
        evaluation_tool_id: row.try_get("evaluation_tool_id")?,
        observer_id: row.try_get("observer_id")?,
        observation_date: row.try_get("observation_date")?,
        scores: scores.0,
        average_score: row
            .try_get::<Option<f64>, _>("average_score")?
            .unwrap_or(0.0),
        teacher_name,
        tool_name: row.try_get("tool_name")?,
        notes: row.try_get("notes")?,
    })
}

pub async fn fetch_teacher(pool: &PgPool, teacher_id: Uuid) -> anyhow::Result<Teacher> {
    let row = sqlx::query(
        "SELECT id, first_name, middle_name, last_name, email, subject, \
         department, level, hire_date, status \
         FROM observation_insights.teachers WHERE id = $1",
    )
    .bind(teacher_id)
    .fetch_one(pool)
    .await
    .with_context(|| format!("teacher {teacher_id} not found"))?;

    let department: String = row.try_get("department")?;
    let level: String = row.try_get("level")?;
    let status: String = row.try_get("status")?;

    Ok(Teacher {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        middle_name: row.try_get("middle_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        subject: row.try_get("subject")?,
        department: department.parse()?,
        level: level.parse()?,
        hire_date: row.try_get("hire_date")?,
        status: status.parse()?,
    })
}

pub async fn fetch_tool(pool: &PgPool, tool_id: Uuid) -> anyhow::Result<EvaluationTool> {
    let row = sqlx::query(
        "SELECT id, name, description, dimensions \
         FROM observation_insights.evaluation_tools WHERE id = $1",
    )
    .bind(tool_id)
    .fetch_one(pool)
    .await
    .with_context(|| format!("evaluation tool {tool_id} not found"))?;

    let dimensions: Json<Vec<String>> = row.try_get("dimensions")?;

    Ok(EvaluationTool {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        dimensions: dimensions.0,
    })
}

/// Derived fields (`average_score`, first lowest dimension) are computed
/// here at write time, never re-derived by the analyzers.
async fn insert_observation(
    pool: &PgPool,
    teacher_id: Uuid,
    evaluation_tool_id: Uuid,
    observer_id: Option<Uuid>,
    observation_date: NaiveDate,
    scores: &ScoreMap,
    notes: Option<&str>,
    source_key: &str,
) -> anyhow::Result<bool> {
    let lowest = scores.lowest();

    let result = sqlx::query(
        r#"
        INSERT INTO observation_insights.observations
        (id, teacher_id, evaluation_tool_id, observer_id, observation_date,
         scores, average_score, lowest_dimension, lowest_score, notes, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(teacher_id)
    .bind(evaluation_tool_id)
    .bind(observer_id)
    .bind(observation_date)
    .bind(Json(scores))
    .bind(scores.average())
    .bind(lowest.map(|(dimension, _)| dimension.to_string()))
    .bind(lowest.map(|(_, score)| score))
    .bind(notes)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn seed_teacher(
    id: &str,
    first_name: &str,
    middle_name: Option<&str>,
    last_name: &str,
    subject: &str,
    department: Department,
    level: Level,
    hire_date: Option<NaiveDate>,
) -> anyhow::Result<Teacher> {
    Ok(Teacher {
        id: Uuid::parse_str(id)?,
        first_name: first_name.to_string(),
        middle_name: middle_name.map(str::to_string),
        last_name: last_name.to_string(),
        email: None,
        subject: Some(subject.to_string()),
        department,
        level,
        hire_date,
        status: Status::Active,
    })
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let teachers = vec![
        seed_teacher(
            "7d4b1b6e-55c0-4ad1-93f4-6e7a0f3b9f01",
            "María",
            Some("Fernanda"),
            "Turcios Mogollón",
            "Maestra de Nursery",
            Department::English,
            Level::Preprimaria,
            NaiveDate::from_ymd_opt(2020, 8, 15),
        )?,
        seed_teacher(
            "9c2e8a31-08f2-4c35-b1a7-d19f52f0a402",
            "Jennifer",
            None,
            "Martínez",
            "Maestra de Preparatoria Ingles",
            Department::English,
            Level::Primaria,
            NaiveDate::from_ymd_opt(2022, 8, 15),
        )?,
        seed_teacher(
            "1f6a9d84-3d25-4f0b-8c59-2b8e1c7d5d03",
            "Cinthia",
            None,
            "Morales",
            "Maestra de Primero Español",
            Department::English,
            Level::Primaria,
            NaiveDate::from_ymd_opt(2020, 8, 15),
        )?,
        seed_teacher(
            "b3d07c92-6e41-48a3-9f26-74c5a8e2bb04",
            "Indira",
            None,
            "Ordoñez",
            "Maestra de Primero Inglés",
            Department::Spanish,
            Level::Primaria,
            NaiveDate::from_ymd_opt(2019, 7, 1),
        )?,
        seed_teacher(
            "e8a54f10-92cd-4b67-a3d8-0c1f9e6b7c05",
            "Cesar",
            None,
            "Arana",
            "Maestro de Science",
            Department::English,
            Level::Bys,
            NaiveDate::from_ymd_opt(2017, 8, 10),
        )?,
        seed_teacher(
            "42c9e7d5-1a38-4e92-b60f-85d2c4a1f906",
            "Misael",
            None,
            "Tale",
            "Maestro Matemáticas",
            Department::Spanish,
            Level::Primaria,
            NaiveDate::from_ymd_opt(2017, 8, 10),
        )?,
    ];

    for teacher in &teachers {
        sqlx::query(
            r#"
            INSERT INTO observation_insights.teachers
            (id, first_name, middle_name, last_name, email, subject, department, level, hire_date, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE
            SET first_name = EXCLUDED.first_name,
                middle_name = EXCLUDED.middle_name,
                last_name = EXCLUDED.last_name,
                subject = EXCLUDED.subject,
                department = EXCLUDED.department,
                level = EXCLUDED.level,
                hire_date = EXCLUDED.hire_date
            "#,
        )
        .bind(teacher.id)
        .bind(&teacher.first_name)
        .bind(&teacher.middle_name)
        .bind(&teacher.last_name)
        .bind(&teacher.email)
        .bind(&teacher.subject)
        .bind(teacher.department.as_str())
        .bind(teacher.level.as_str())
        .bind(teacher.hire_date)
        .bind(teacher.status.as_str())
        .execute(pool)
        .await?;
    }

    let observers = vec![
        Observer {
            id: Uuid::new_v4(),
            name: "Lorena Castillo".to_string(),
            department: Department::English,
        },
        Observer {
            id: Uuid::new_v4(),
            name: "Karla Bizerra".to_string(),
            department: Department::Spanish,
        },
        Observer {
            id: Uuid::new_v4(),
            name: "Ingrid de León".to_string(),
            department: Department::English,
        },
    ];

    for observer in &observers {
        sqlx::query(
            r#"
            INSERT INTO observation_insights.observers (id, name, department)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET department = EXCLUDED.department
            "#,
        )
        .bind(observer.id)
        .bind(&observer.name)
        .bind(observer.department.as_str())
        .execute(pool)
        .await?;
    }

    let eleot_id = Uuid::parse_str("5a1c3f7e-8b42-4d90-a6e1-2f4c8d9b3a07")?;
    let tot_id = Uuid::parse_str("d2f81c4a-6e95-43b7-8a0d-9c3e5f1b2608")?;

    let tools = vec![
        (
            eleot_id,
            "ELEOT",
            "Effective Learning Environments Observation Tool",
            vec![
                "Equitable Learning",
                "High Expectations",
                "Supportive Learning",
                "Active Learning",
                "Progress Monitoring",
                "Well-Managed Learning",
                "Digital Learning",
            ],
        ),
        (
            tot_id,
            "TOT",
            "Teacher Observation Tool",
            vec!["Lesson Planning", "Time on Task", "Student Engagement"],
        ),
    ];

    for (id, name, description, dimensions) in tools {
        sqlx::query(
            r#"
            INSERT INTO observation_insights.evaluation_tools (id, name, description, dimensions)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO UPDATE
            SET description = EXCLUDED.description, dimensions = EXCLUDED.dimensions
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(Json(dimensions))
        .execute(pool)
        .await?;
    }

    let observer_id: Uuid =
        sqlx::query("SELECT id FROM observation_insights.observers WHERE name = $1")
            .bind("Lorena Castillo")
            .fetch_one(pool)
            .await?
            .get("id");

    let jennifer = Uuid::parse_str("9c2e8a31-08f2-4c35-b1a7-d19f52f0a402")?;
    let cinthia = Uuid::parse_str("1f6a9d84-3d25-4f0b-8c59-2b8e1c7d5d03")?;
    let indira = Uuid::parse_str("b3d07c92-6e41-48a3-9f26-74c5a8e2bb04")?;
    let cesar = Uuid::parse_str("e8a54f10-92cd-4b67-a3d8-0c1f9e6b7c05")?;
    let misael = Uuid::parse_str("42c9e7d5-1a38-4e92-b60f-85d2c4a1f906")?;

    let observations = vec![
        (
            "seed-001",
            jennifer,
            eleot_id,
            NaiveDate::from_ymd_opt(2025, 9, 12).context("invalid date")?,
            ScoreMap::from_pairs([
                ("Equitable Learning", 2.5),
                ("High Expectations", 2.8),
                ("Supportive Learning", 3.0),
                ("Active Learning", 2.6),
            ]),
            Some("First visit of the school year"),
        ),
        (
            "seed-002",
            jennifer,
            eleot_id,
            NaiveDate::from_ymd_opt(2025, 10, 10).context("invalid date")?,
            ScoreMap::from_pairs([
                ("Equitable Learning", 3.0),
                ("High Expectations", 3.2),
                ("Supportive Learning", 3.4),
                ("Active Learning", 3.1),
            ]),
            None,
        ),
        (
            "seed-003",
            jennifer,
            eleot_id,
            NaiveDate::from_ymd_opt(2025, 11, 7).context("invalid date")?,
            ScoreMap::from_pairs([
                ("Equitable Learning", 3.6),
                ("High Expectations", 3.8),
                ("Supportive Learning", 3.9),
                ("Active Learning", 3.5),
            ]),
            Some("Marked improvement in student grouping"),
        ),
        (
            "seed-004",
            cinthia,
            eleot_id,
            NaiveDate::from_ymd_opt(2025, 10, 17).context("invalid date")?,
            ScoreMap::from_pairs([
                ("Equitable Learning", 2.2),
                ("High Expectations", 2.0),
                ("Supportive Learning", 2.8),
                ("Well-Managed Learning", 2.4),
            ]),
            Some("Pacing issues through the middle block"),
        ),
        (
            "seed-005",
            cinthia,
            eleot_id,
            NaiveDate::from_ymd_opt(2025, 11, 14).context("invalid date")?,
            ScoreMap::from_pairs([
                ("Equitable Learning", 2.4),
                ("High Expectations", 2.3),
                ("Supportive Learning", 2.9),
                ("Well-Managed Learning", 2.6),
            ]),
            None,
        ),
        (
            "seed-006",
            cesar,
            eleot_id,
            NaiveDate::from_ymd_opt(2025, 10, 24).context("invalid date")?,
            ScoreMap::from_pairs([
                ("Equitable Learning", 3.9),
                ("High Expectations", 3.7),
                ("Supportive Learning", 4.0),
                ("Active Learning", 3.8),
                ("Digital Learning", 3.6),
            ]),
            None,
        ),
        (
            "seed-007",
            cesar,
            eleot_id,
            NaiveDate::from_ymd_opt(2025, 11, 21).context("invalid date")?,
            ScoreMap::from_pairs([
                ("Equitable Learning", 3.8),
                ("High Expectations", 3.9),
                ("Supportive Learning", 3.7),
                ("Active Learning", 4.0),
                ("Digital Learning", 3.5),
            ]),
            Some("Strong station rotation lesson"),
        ),
        (
            "seed-008",
            indira,
            eleot_id,
            NaiveDate::from_ymd_opt(2025, 11, 5).context("invalid date")?,
            ScoreMap::from_pairs([
                ("Equitable Learning", 3.1),
                ("High Expectations", 3.3),
                ("Progress Monitoring", 3.0),
            ]),
            None,
        ),
        (
            "seed-009",
            misael,
            tot_id,
            NaiveDate::from_ymd_opt(2025, 10, 3).context("invalid date")?,
            ScoreMap::from_pairs([
                ("Lesson Planning", 3.4),
                ("Time on Task", 2.9),
                ("Student Engagement", 3.1),
            ]),
            None,
        ),
        (
            "seed-010",
            misael,
            tot_id,
            NaiveDate::from_ymd_opt(2025, 11, 28).context("invalid date")?,
            ScoreMap::from_pairs([
                ("Lesson Planning", 3.6),
                ("Time on Task", 3.2),
                ("Student Engagement", 3.5),
            ]),
            Some("Better transitions between activities"),
        ),
    ];

    for (source_key, teacher_id, tool_id, observation_date, scores, notes) in observations {
        insert_observation(
            pool,
            teacher_id,
            tool_id,
            Some(observer_id),
            observation_date,
            &scores,
            notes,
            source_key,
        )
        .await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        first_name: String,
        middle_name: Option<String>,
        last_name: String,
        department: String,
        level: String,
        evaluation_tool: String,
        observation_date: NaiveDate,
        scores: String,
        notes: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;

        let scores: ScoreMap = serde_json::from_str(&row.scores).with_context(|| {
            format!("invalid scores for {} {}", row.first_name, row.last_name)
        })?;
        let department: Department = row.department.parse()?;
        let level: Level = row.level.parse()?;

        let teacher_id = resolve_teacher(
            pool,
            &row.first_name,
            row.middle_name.as_deref(),
            &row.last_name,
            department,
            level,
        )
        .await?;
        let tool_id = resolve_tool(pool, &row.evaluation_tool, &scores).await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let created = insert_observation(
            pool,
            teacher_id,
            tool_id,
            None,
            row.observation_date,
            &scores,
            row.notes.as_deref(),
            &source_key,
        )
        .await?;

        if created {
            inserted += 1;
        }
    }

    Ok(inserted)
}

async fn resolve_teacher(
    pool: &PgPool,
    first_name: &str,
    middle_name: Option<&str>,
    last_name: &str,
    department: Department,
    level: Level,
) -> anyhow::Result<Uuid> {
    let existing = sqlx::query(
        "SELECT id FROM observation_insights.teachers \
         WHERE first_name = $1 AND middle_name IS NOT DISTINCT FROM $2 AND last_name = $3",
    )
    .bind(first_name)
    .bind(middle_name)
    .bind(last_name)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = existing {
        return Ok(row.get("id"));
    }

    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO observation_insights.teachers
        (id, first_name, middle_name, last_name, department, level, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(first_name)
    .bind(middle_name)
    .bind(last_name)
    .bind(department.as_str())
    .bind(level.as_str())
    .bind(Status::Active.as_str())
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

/// A tool first seen during import gets its dimension list from the row's
/// score keys, in their document order.
async fn resolve_tool(pool: &PgPool, name: &str, scores: &ScoreMap) -> anyhow::Result<Uuid> {
    let existing =
        sqlx::query("SELECT id FROM observation_insights.evaluation_tools WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await?;

    if let Some(row) = existing {
        return Ok(row.get("id"));
    }

    let dimensions: Vec<String> = scores.dimensions().map(str::to_string).collect();
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO observation_insights.evaluation_tools (id, name, dimensions)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(Json(dimensions))
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}
