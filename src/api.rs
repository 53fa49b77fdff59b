use rocket::Route;

mod dashboard;
mod map;
mod voters;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(voters::routes());
    routes.extend(dashboard::routes());
    routes.extend(map::routes());
    routes
}
