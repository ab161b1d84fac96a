pub mod form;
pub mod routes;

pub mod admin {
    pub mod admin_handlers;
    pub mod admin_models;
}

pub mod checklist {
    pub mod checklist_handlers;
    pub mod checklist_models;
}

pub mod fms {
    pub mod fms_handlers;
    pub mod fms_models;
}

pub mod login {
    pub mod login_handlers;
    pub mod login_models;
}

pub mod notifications {
    pub mod notifications_handlers;
    pub mod notifications_models;
}

pub mod requests {
    pub mod requests_handlers;
    pub mod requests_models;
}

pub mod status {
    pub mod status_handlers;
    pub mod status_models;
}

pub mod tasks {
    pub mod tasks_handlers;
    pub mod tasks_models;
}

pub mod users {
    pub mod users_handlers;
    pub mod users_models;
}
