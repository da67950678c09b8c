use serde_json::{Value, json};

// First-run seed content. A fresh board (and any document missing one
// of these singleton fields) starts from these values.

pub(crate) fn default_users() -> Value {
    json!([
        { "name": "Operations", "capacity": 40 },
        { "name": "Engineering", "capacity": 40 },
        { "name": "Maintenance", "capacity": 40 },
        { "name": "Quality", "capacity": 40 },
        { "name": "Planning", "capacity": 40 }
    ])
}

pub(crate) fn default_categories() -> Value {
    json!([
        "Safety",
        "Priority",
        "Support Required",
        "Long Term Project",
        "Short Term Project",
        "Quality",
        "Maintenance"
    ])
}

pub(crate) fn default_daily_agenda() -> Value {
    json!({
        "Monday": "Orders & Planning",
        "Tuesday": "Safety Review",
        "Wednesday": "Project Updates",
        "Thursday": "Technical Review",
        "Friday": "Weekly Review & Alignment"
    })
}
