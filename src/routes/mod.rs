use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{
    comments, email, events, health_check, ratings, registrations, stats, users,
};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/mine", get(events::my_events))
        .route("/events/favorites/user", get(events::user_favorite_events))
        .route(
            "/events/public/favorites/:user_id",
            get(events::public_favorite_events),
        )
        .route("/events/geocode/:location", get(events::geocode_location))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route(
            "/events/:id/favorite",
            post(events::favorite_event).delete(events::unfavorite_event),
        )
        .route("/events/:id/weather", get(events::event_weather))
        .route("/event_types", get(events::list_event_types))
        .route("/users", get(users::list_users))
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        .route("/users/profile", get(users::profile))
        .route("/users/ban/:id", put(users::ban_user))
        .route("/users/statistics/:id", get(users::user_statistics))
        .route(
            "/users/favorites/organizers",
            get(users::favorite_organizers),
        )
        .route(
            "/users/favorite_organizer/:id",
            post(users::favorite_organizer).delete(users::unfavorite_organizer),
        )
        .route(
            "/users/:id",
            put(users::update_user).delete(users::delete_user),
        )
        .route("/users/:id/public", get(users::public_profile))
        .route(
            "/users/:id/public/favorites/organizers",
            get(users::public_favorite_organizers),
        )
        .route("/users/:id/events", get(events::user_events))
        .route(
            "/comments",
            get(comments::list_event_comments).post(comments::create_comment),
        )
        .route(
            "/comments/:id",
            put(comments::update_comment).delete(comments::delete_comment),
        )
        .route(
            "/ratings",
            get(ratings::list_event_ratings).post(ratings::create_rating),
        )
        .route(
            "/ratings/:id",
            put(ratings::update_rating).delete(ratings::delete_rating),
        )
        .route("/registrations", post(registrations::create_registration))
        .route("/registrations/user", get(registrations::my_registrations))
        .route(
            "/registrations/:event_id",
            delete(registrations::delete_registration),
        )
        .route("/statistics", get(stats::site_statistics))
        .route("/email/contact", post(email::contact))
        .route("/email/send-reminders", post(email::trigger_reminders))
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}
