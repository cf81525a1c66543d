//! `/v1/movies` handlers.

// crates.io
use axum::{
	Extension, Json,
	extract::{Path, Query, State},
	http::{HeaderMap, HeaderValue, StatusCode, header},
	response::{IntoResponse, Response},
};
use serde_json::json;
// self
use crate::{
	_prelude::*,
	app::App,
	http::{CurrentUser, JsonBody},
	models::{
		FilterParams, Filters, MOVIES_READ, MOVIES_WRITE, Movie, Runtime, Validator, parse_id,
	},
	store::Versioned,
};

/// Header carrying the version a client expects to overwrite.
pub const EXPECTED_VERSION_HEADER: &str = "x-expected-version";

#[derive(Debug, Serialize)]
struct MovieView<'a> {
	id: i64,
	title: &'a str,
	year: i32,
	runtime: Runtime,
	genres: &'a [String],
	version: u32,
}
impl<'a> From<&'a Versioned<Movie>> for MovieView<'a> {
	fn from(row: &'a Versioned<Movie>) -> Self {
		Self {
			id: row.id.get(),
			title: &row.data.title,
			year: row.data.year,
			runtime: row.data.runtime,
			genres: &row.data.genres,
			version: row.version,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct CreateMovie {
	#[serde(default)]
	title: String,
	#[serde(default)]
	year: i32,
	#[serde(default)]
	runtime: Runtime,
	#[serde(default)]
	genres: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct UpdateMovie {
	title: Option<String>,
	year: Option<i32>,
	runtime: Option<Runtime>,
	genres: Option<Vec<String>>,
}

pub(super) async fn list(
	State(app): State<App>,
	Extension(current): Extension<CurrentUser>,
	Query(query): Query<HashMap<String, String>>,
) -> Result<Response> {
	app.accounts.authorize(current.user(), MOVIES_READ).await?;

	let title = query.get("title").cloned().unwrap_or_default();
	let genres: Vec<String> = query
		.get("genres")
		.map(|raw| raw.split(',').filter(|g| !g.is_empty()).map(str::to_owned).collect())
		.unwrap_or_default();
	let params = FilterParams {
		page: query.get("page").cloned(),
		page_size: query.get("page_size").cloned(),
		sort: query.get("sort").cloned(),
	};
	let mut v = Validator::new();
	let filters = Filters::parse(&params, &mut v);

	v.finish()?;

	let (movies, metadata) = app.movies.list(&title, &genres, &filters).await?;
	let views: Vec<MovieView> = movies.iter().map(MovieView::from).collect();

	Ok(Json(json!({ "movies": views, "metadata": metadata })).into_response())
}

pub(super) async fn create(
	State(app): State<App>,
	Extension(current): Extension<CurrentUser>,
	JsonBody(input): JsonBody<CreateMovie>,
) -> Result<Response> {
	app.accounts.authorize(current.user(), MOVIES_WRITE).await?;

	let movie =
		Movie { title: input.title, year: input.year, runtime: input.runtime, genres: input.genres };
	let mut v = Validator::new();

	movie.validate(&mut v, app.current_year());
	v.finish()?;

	let created = app.movies.insert(movie).await?;
	let location = HeaderValue::from_str(&format!("/v1/movies/{}", created.id))
		.map_err(|e| Error::internal(format!("invalid location header: {e}")))?;

	Ok((
		StatusCode::CREATED,
		[(header::LOCATION, location)],
		Json(json!({ "movie": MovieView::from(&created) })),
	)
		.into_response())
}

pub(super) async fn show(
	State(app): State<App>,
	Extension(current): Extension<CurrentUser>,
	Path(raw_id): Path<String>,
) -> Result<Response> {
	app.accounts.authorize(current.user(), MOVIES_READ).await?;

	let movie = app.movies.get(parse_id(&raw_id)?).await?;

	Ok(Json(json!({ "movie": MovieView::from(&movie) })).into_response())
}

pub(super) async fn update(
	State(app): State<App>,
	Extension(current): Extension<CurrentUser>,
	Path(raw_id): Path<String>,
	headers: HeaderMap,
	JsonBody(input): JsonBody<UpdateMovie>,
) -> Result<Response> {
	app.accounts.authorize(current.user(), MOVIES_WRITE).await?;

	let current_row = app.movies.get(parse_id(&raw_id)?).await?;

	if let Some(expected) = headers.get(EXPECTED_VERSION_HEADER) {
		let expected = expected.to_str().ok().and_then(|raw| raw.trim().parse::<u32>().ok());

		if expected != Some(current_row.version) {
			return Err(Error::EditConflict);
		}
	}

	let mut movie = current_row.data.clone();

	if let Some(title) = input.title {
		movie.title = title;
	}
	if let Some(year) = input.year {
		movie.year = year;
	}
	if let Some(runtime) = input.runtime {
		movie.runtime = runtime;
	}
	if let Some(genres) = input.genres {
		movie.genres = genres;
	}

	let mut v = Validator::new();

	movie.validate(&mut v, app.current_year());
	v.finish()?;

	let updated = app.movies.update(current_row.id, current_row.version, movie).await?;

	Ok(Json(json!({ "movie": MovieView::from(&updated) })).into_response())
}

pub(super) async fn delete(
	State(app): State<App>,
	Extension(current): Extension<CurrentUser>,
	Path(raw_id): Path<String>,
) -> Result<Response> {
	app.accounts.authorize(current.user(), MOVIES_WRITE).await?;
	app.movies.delete(parse_id(&raw_id)?).await?;

	Ok(Json(json!({ "message": "movie successfully deleted" })).into_response())
}
